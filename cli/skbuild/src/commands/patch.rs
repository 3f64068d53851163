//! `skbuild patch`: apply a patch set to the library checkout.

use std::path::PathBuf;

use anyhow::{Context, Result};
use skbuild_patch::{builtin, FileOutcome, PatchSet};

use crate::manifest::Project;

pub const DEFAULT_SET: &str = "wasm-demo";

#[derive(Debug, Clone, Default, clap::Args)]
pub struct PatchArgs {
    /// Checkout to patch (default: <workspace>/src/skia)
    #[arg(long)]
    pub source: Option<PathBuf>,
    /// Built-in patch set (wasm-demo, dawn-apple)
    #[arg(long, conflicts_with = "file")]
    pub set: Option<String>,
    /// Patch set definition file
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Report what would change without writing
    #[arg(long)]
    pub check: bool,
}

fn load_set(args: &PatchArgs) -> Result<PatchSet> {
    match &args.file {
        Some(path) => {
            PatchSet::load(path).with_context(|| format!("loading {}", path.display()))
        }
        None => Ok(builtin(args.set.as_deref().unwrap_or(DEFAULT_SET))?),
    }
}

/// Apply (or check) the selected set and return per-file outcomes.
pub fn apply(project: &Project, args: &PatchArgs) -> Result<Vec<FileOutcome>> {
    let set = load_set(args)?;
    let source = args
        .source
        .clone()
        .unwrap_or_else(|| project.workspace().source_dir());
    let outcomes = if args.check {
        set.check(&source)
    } else {
        set.apply(&source)
    };
    outcomes.with_context(|| format!("patch set '{}' on {}", set.name, source.display()))
}

pub fn run(project: &Project, args: &PatchArgs) -> Result<()> {
    for outcome in apply(project, args)? {
        println!("{outcome}");
    }
    Ok(())
}
