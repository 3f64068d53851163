//! `skbuild build`: one platform, end to end.

use anyhow::{Context, Result};
use skbuild_driver::{pipeline, BuildTarget, PipelineOptions, SystemRunner};
use skbuild_targets::parse_arch_list;

use crate::manifest::Project;

#[derive(Debug, Clone, Default, clap::Args)]
pub struct BuildArgs {
    /// Platform (mac, ios, win, linux, wasm, visionos) or xcframework
    pub target: String,
    /// Build configuration (debug, release)
    #[arg(long)]
    pub config: Option<String>,
    /// Comma-separated architectures (default: the platform's defaults)
    #[arg(long)]
    pub archs: Option<String>,
    /// Branch, tag or revision to check out
    #[arg(long)]
    pub branch: Option<String>,
    /// Clone with --depth 1
    #[arg(long)]
    pub shallow: bool,
    /// Graphics variant (cpu, gpu)
    #[arg(long)]
    pub variant: Option<String>,
    /// Unicode backend (icu, libgrapheme)
    #[arg(long)]
    pub text_backend: Option<String>,
    /// Archive the platform output tree
    #[arg(long)]
    pub zip: bool,
    /// Also write the all-platforms archive
    #[arg(long)]
    pub zip_all: bool,
    /// Write placeholder outputs instead of fetching and compiling
    #[arg(long)]
    pub test_mode: bool,
    /// Keep per-architecture build directories under tmp/
    #[arg(long)]
    pub keep_intermediate: bool,
}

/// Resolve flags over `skbuild.toml` over built-in defaults.
pub fn options(project: &Project, args: &BuildArgs) -> Result<PipelineOptions> {
    let manifest = &project.manifest;
    let target: BuildTarget = args.target.parse()?;

    let mut opts = PipelineOptions::new(target, Default::default());
    let config = &mut opts.config;
    if let Some(c) = &args.config {
        config.configuration = c.parse()?;
    }
    if let Some(list) = &args.archs {
        config.archs = parse_arch_list(list).context("--archs")?;
    }
    if let Some(rev) = args.branch.as_ref().or(manifest.source.branch.as_ref()) {
        config.revision = rev.clone();
    }
    config.shallow = args.shallow || manifest.source.shallow.unwrap_or(false);
    config.variant = match &args.variant {
        Some(v) => v.parse()?,
        None => manifest.build.variant.unwrap_or_default(),
    };
    config.text_backend = match &args.text_backend {
        Some(t) => t.parse()?,
        None => manifest.build.text_backend.unwrap_or_default(),
    };

    opts.source = manifest.source_spec();
    if let Some(clang) = &manifest.build.clang_win {
        opts.clang_win = clang.clone();
    }
    opts.overrides = manifest.gn_overrides()?;
    opts.zip = args.zip;
    opts.zip_all = args.zip_all;
    opts.test_mode = args.test_mode;
    opts.keep_intermediate = args.keep_intermediate;
    Ok(opts)
}

pub fn run(project: &Project, args: &BuildArgs) -> Result<()> {
    let opts = options(project, args)?;
    let report = pipeline::run(&project.workspace(), &mut SystemRunner, &opts)
        .with_context(|| format!("building {}", opts.target))?;
    println!("{report}");
    Ok(())
}
