//! `skbuild package`: archive existing output trees.

use anyhow::{Context, Result};
use skbuild_driver::pipeline::archive_existing;
use skbuild_targets::Variant;

use crate::manifest::Project;

pub fn run(project: &Project, all: bool, variant: Option<&str>) -> Result<()> {
    let variant: Variant = match variant {
        Some(v) => v.parse()?,
        None => project.manifest.build.variant.unwrap_or_default(),
    };
    let archives = archive_existing(&project.workspace(), variant, all)
        .with_context(|| format!("packaging {variant} outputs under {}", project.root.display()))?;
    for archive in archives {
        println!(
            "{} ({} files)\n  sha256 {}",
            archive.path.display(),
            archive.files,
            archive.sha256
        );
    }
    Ok(())
}
