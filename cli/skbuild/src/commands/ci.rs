//! `skbuild ci`: build several platforms in sequence.

use anyhow::{Context, Result};
use skbuild_driver::pipeline::{self, archive_all_platforms};
use skbuild_driver::{PipelineOptions, SystemRunner};
use skbuild_targets::PlatformId;
use tracing::info;

use super::build::{self, BuildArgs};
use crate::manifest::Project;

#[derive(Debug, Clone, clap::Args)]
pub struct CiArgs {
    /// Comma-separated platforms, or "all"
    #[arg(long, default_value = "all")]
    pub platforms: String,
    /// Branch, tag or revision to check out
    #[arg(long)]
    pub revision: Option<String>,
    /// Write placeholder outputs instead of fetching and compiling
    #[arg(long)]
    pub test_mode: bool,
    /// Skip archives
    #[arg(long)]
    pub skip_release: bool,
}

/// Expand `--platforms` into build target names. `xcframework` may be
/// listed alongside platforms.
pub fn targets(list: &str) -> Vec<String> {
    if list.trim() == "all" {
        return PlatformId::ALL.iter().map(|p| p.to_string()).collect();
    }
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolve every target before anything is built.
pub fn plan(project: &Project, args: &CiArgs) -> Result<Vec<PipelineOptions>> {
    let names = targets(&args.platforms);
    if names.is_empty() {
        anyhow::bail!("--platforms selected nothing");
    }
    names
        .into_iter()
        .map(|target| {
            let build_args = BuildArgs {
                target,
                branch: args.revision.clone(),
                test_mode: args.test_mode,
                zip: !args.skip_release,
                ..Default::default()
            };
            build::options(project, &build_args)
        })
        .collect()
}

pub fn run(project: &Project, args: &CiArgs) -> Result<()> {
    let runs = plan(project, args)?;
    let ws = project.workspace();
    let mut runner = SystemRunner;

    info!("ci: {} target(s)", runs.len());
    for opts in &runs {
        let report = pipeline::run(&ws, &mut runner, opts)
            .with_context(|| format!("building {}", opts.target))?;
        println!("{report}");
    }

    if !args.skip_release {
        if let Some(first) = runs.first() {
            let archive = archive_all_platforms(&ws, first.config.variant)?;
            println!("Archive: {} (sha256 {})", archive.path.display(), archive.sha256);
        }
    }
    Ok(())
}
