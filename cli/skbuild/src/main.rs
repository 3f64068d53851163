//! skbuild: fetch, build and package Skia for desktop, mobile and web targets.

mod commands;
mod manifest;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use manifest::Project;

#[derive(Parser)]
#[command(name = "skbuild", version, about = "Build Skia static libraries for every platform")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Workspace root (default: the directory holding skbuild.toml, or the current directory)
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, build and package one platform (or the Apple XCFramework)
    Build(commands::build::BuildArgs),
    /// Build a list of platforms in sequence, as CI does
    Ci(commands::ci::CiArgs),
    /// Print the GN arguments a build would use, without running anything
    Args(commands::args::ShowArgs),
    /// Apply a patch set to the library checkout
    Patch(commands::patch::PatchArgs),
    /// Inspect supported platforms
    Target {
        #[command(subcommand)]
        action: TargetAction,
    },
    /// Archive output trees that already exist
    Package {
        /// Also write the all-platforms archive
        #[arg(long)]
        all: bool,
        /// Variant whose output trees to archive (cpu, gpu)
        #[arg(long)]
        variant: Option<String>,
    },
    /// Check external tools and configuration
    Doctor,
    /// Remove intermediate build directories
    Clean {
        /// Also remove the library and depot_tools checkouts
        #[arg(long)]
        sources: bool,
    },
}

#[derive(Subcommand)]
enum TargetAction {
    /// List supported platforms
    List,
    /// Show details of a platform
    Describe {
        /// Platform name
        name: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    let project = Project::discover(cli.workspace.as_deref(), &cwd)?;

    match cli.command {
        Commands::Build(args) => commands::build::run(&project, &args),
        Commands::Ci(args) => commands::ci::run(&project, &args),
        Commands::Args(args) => commands::args::run(&project, &args),
        Commands::Patch(args) => commands::patch::run(&project, &args),
        Commands::Target { action } => match action {
            TargetAction::List => commands::target::list(),
            TargetAction::Describe { name } => commands::target::describe(&name),
        },
        Commands::Package { all, variant } => {
            commands::package::run(&project, all, variant.as_deref())
        }
        Commands::Doctor => commands::doctor::run(&project),
        Commands::Clean { sources } => commands::clean::run(&project, sources),
    }
}
