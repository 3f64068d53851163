//! `skbuild doctor`: toolchain diagnostics.

use std::process::Command;

use anyhow::Result;
use skbuild_driver::fetch::read_stamp;

use crate::manifest::{Project, MANIFEST_FILE};

/// External tools the pipeline may invoke, with their version flags.
const TOOLS: [(&str, &[&str]); 8] = [
    ("git", &["--version"]),
    ("python3", &["--version"]),
    ("ninja", &["--version"]),
    ("cmake", &["--version"]),
    ("emcc", &["--version"]),
    ("lipo", &[]),
    ("libtool", &["-V"]),
    ("xcodebuild", &["-version"]),
];

/// Print toolchain and workspace diagnostics.
pub fn run(project: &Project) -> Result<()> {
    println!("=== skbuild Doctor ===");
    println!();
    println!("skbuild version: {}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("--- External Tools ---");
    for (name, args) in TOOLS {
        print_tool_status(name, args);
    }
    println!();

    println!("--- Workspace ---");
    let ws = project.workspace();
    println!("  Root:        {}", ws.root().display());
    match &project.manifest_dir {
        Some(dir) => println!("  {MANIFEST_FILE}: found at {}", dir.display()),
        None => println!("  {MANIFEST_FILE}: not found (using defaults)"),
    }
    match read_stamp(&ws) {
        Some(rev) => println!("  Checkout:    {} ({rev})", ws.source_dir().display()),
        None => println!("  Checkout:    not fetched"),
    }
    let depot = ws.depot_tools_dir();
    println!(
        "  depot_tools: {}",
        if depot.is_dir() {
            depot.display().to_string()
        } else {
            "not fetched".to_string()
        }
    );
    Ok(())
}

fn print_tool_status(name: &str, args: &[&str]) {
    match Command::new(name).args(args).output() {
        Ok(output) => {
            let text = if output.stdout.is_empty() {
                String::from_utf8_lossy(&output.stderr)
            } else {
                String::from_utf8_lossy(&output.stdout)
            };
            let first_line = text.lines().next().unwrap_or("(unknown version)");
            println!("  {name}: {first_line}");
        }
        Err(_) => {
            println!("  {name}: not found");
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn doctor_runs_without_error() {
        let dir = tempfile::tempdir().unwrap();
        super::run(&crate::manifest::Project::bare(dir.path())).unwrap();
    }
}
