//! Build summaries: the `gn_args.txt` file written next to each platform's
//! libraries and the report printed at the end of a run.

use std::fmt;
use std::path::PathBuf;

use skbuild_targets::{Arch, Configuration, GnArgs, PlatformId, Variant};

use crate::fetch::FetchOutcome;
use crate::package::ArchiveInfo;

/// Contents of `gn_args.txt`.
#[derive(Debug, Clone)]
pub struct GnSummary {
    pub platform: PlatformId,
    pub configuration: Configuration,
    pub variant: Variant,
    pub slices: Vec<(Arch, GnArgs)>,
}

impl fmt::Display for GnSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Skia Build Summary for {} ({})", self.platform, self.variant)?;
        writeln!(f, "Configuration: {}", self.configuration)?;
        writeln!(f, "Variant: {}", self.variant)?;
        let archs: Vec<&str> = self.slices.iter().map(|(a, _)| a.as_str()).collect();
        writeln!(f, "Architectures: {}", archs.join(", "))?;
        writeln!(f)?;
        writeln!(f, "GN Arguments:")?;
        for (arch, args) in &self.slices {
            writeln!(f)?;
            writeln!(f, "For {arch}:")?;
            writeln!(f, "{}", args.render())?;
        }
        Ok(())
    }
}

/// Per-platform result within a run.
#[derive(Debug, Clone)]
pub struct PlatformReport {
    pub platform: PlatformId,
    pub configuration: Configuration,
    /// Slices built (or stubbed in test mode).
    pub archs: Vec<Arch>,
    /// Final library locations.
    pub libraries: Vec<PathBuf>,
    pub summary_path: PathBuf,
}

/// Summary of one pipeline run.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub target: String,
    pub variant: Variant,
    pub revision: String,
    pub test_mode: bool,
    /// `None` in test mode, where nothing is fetched.
    pub fetch: Option<FetchOutcome>,
    pub platforms: Vec<PlatformReport>,
    pub headers_copied: usize,
    pub xcframework: Option<PathBuf>,
    pub archives: Vec<ArchiveInfo>,
    pub duration_ms: u64,
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Build Report ===")?;
        writeln!(f, "Target:   {} ({})", self.target, self.variant)?;
        writeln!(f, "Revision: {}", self.revision)?;
        if self.test_mode {
            writeln!(f, "Mode:     test (placeholder outputs)")?;
        }
        if let Some(fetch) = self.fetch {
            writeln!(f, "Source:   {fetch}")?;
        }
        writeln!(f, "Duration: {} ms", self.duration_ms)?;

        for platform in &self.platforms {
            writeln!(f)?;
            writeln!(
                f,
                "--- {} {} ---",
                platform.platform, platform.configuration
            )?;
            let archs: Vec<&str> = platform.archs.iter().map(|a| a.as_str()).collect();
            writeln!(f, "  Architectures: {}", archs.join(", "))?;
            writeln!(f, "  Libraries:     {}", platform.libraries.len())?;
            for lib in &platform.libraries {
                writeln!(f, "    {}", lib.display())?;
            }
            writeln!(f, "  GN summary:    {}", platform.summary_path.display())?;
        }

        writeln!(f)?;
        writeln!(f, "--- Packaging ---")?;
        writeln!(f, "  Headers copied: {}", self.headers_copied)?;
        if let Some(xcf) = &self.xcframework {
            writeln!(f, "  XCFramework:    {}", xcf.display())?;
        }
        for archive in &self.archives {
            writeln!(
                f,
                "  Archive: {} ({} files, sha256 {})",
                archive.path.display(),
                archive.files,
                archive.sha256
            )?;
        }
        Ok(())
    }
}
