//! `skbuild args`: print assembled GN arguments without running anything.

use anyhow::{bail, Result};
use serde::Serialize;
use skbuild_targets::{assemble, ArgRequest, Arch, GnArgs, PlatformId};

use crate::manifest::Project;

#[derive(Debug, Clone, Default, clap::Args)]
pub struct ShowArgs {
    /// Platform name
    pub platform: String,
    /// Build configuration (debug, release)
    #[arg(long)]
    pub config: Option<String>,
    /// Single architecture (default: every slice the platform builds)
    #[arg(long)]
    pub arch: Option<String>,
    /// Graphics variant (cpu, gpu)
    #[arg(long)]
    pub variant: Option<String>,
    /// Unicode backend (icu, libgrapheme)
    #[arg(long)]
    pub text_backend: Option<String>,
    /// Output format (gn, json)
    #[arg(long, default_value = "gn")]
    pub format: String,
}

#[derive(Serialize)]
struct SliceArgs<'a> {
    arch: Arch,
    args: &'a GnArgs,
}

/// Assemble the arguments for every requested slice.
pub fn assemble_slices(project: &Project, show: &ShowArgs) -> Result<Vec<(Arch, GnArgs)>> {
    let manifest = &project.manifest;
    let platform: PlatformId = show.platform.parse()?;
    let requested = match &show.arch {
        Some(a) => vec![a.parse::<Arch>()?],
        None => Vec::new(),
    };
    let slices = platform.target().build_slices(&requested)?;
    let overrides = manifest
        .gn_overrides()?
        .remove(&platform)
        .unwrap_or_default();

    slices
        .into_iter()
        .map(|arch| -> Result<(Arch, GnArgs)> {
            let mut req = ArgRequest::new(Default::default(), platform, arch);
            if let Some(c) = &show.config {
                req.configuration = c.parse()?;
            }
            req.variant = match &show.variant {
                Some(v) => v.parse()?,
                None => manifest.build.variant.unwrap_or_default(),
            };
            req.text_backend = match &show.text_backend {
                Some(t) => t.parse()?,
                None => manifest.build.text_backend.unwrap_or_default(),
            };
            if let Some(clang) = &manifest.build.clang_win {
                req.clang_win = clang.clone();
            }
            req.overrides = overrides.clone();
            Ok((arch, assemble(&req)?))
        })
        .collect()
}

/// Render in the requested format.
pub fn render(project: &Project, show: &ShowArgs) -> Result<String> {
    let slices = assemble_slices(project, show)?;
    match show.format.as_str() {
        "gn" => Ok(slices
            .iter()
            .map(|(arch, args)| format!("# {} {arch}\n{}\n", show.platform, args.render()))
            .collect::<Vec<_>>()
            .join("\n")),
        "json" => {
            let out: Vec<SliceArgs<'_>> = slices
                .iter()
                .map(|(arch, args)| SliceArgs { arch: *arch, args })
                .collect();
            Ok(serde_json::to_string_pretty(&out)?)
        }
        other => bail!("unknown format '{other}' (expected gn or json)"),
    }
}

pub fn run(project: &Project, show: &ShowArgs) -> Result<()> {
    print!("{}", render(project, show)?);
    if show.format == "json" {
        println!();
    }
    Ok(())
}
