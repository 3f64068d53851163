//! Build pipeline orchestrator.
//!
//! fetch -> per slice (gn gen, ninja, collect) -> universal / combine ->
//! headers -> XCFramework -> summaries -> cleanup -> archives.
//!
//! Every platform, architecture and GN table is resolved before the first
//! process is spawned.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use skbuild_targets::{
    assemble, ArgRequest, Arch, BuildConfig, Configuration, GnArgs, PlatformId, TargetError,
    Variant,
};
use tracing::{info, warn};

use crate::build::{build_slice, SliceRequest};
use crate::error::{DriverError, Result};
use crate::fetch::{self, SourceSpec};
use crate::layout::{remove_dir_if_present, Workspace};
use crate::package::{create_archive, package_generated_dawn_headers, package_headers, ArchiveInfo};
use crate::report::{BuildReport, GnSummary, PlatformReport};
use crate::runner::ProcessRunner;
use crate::universal::{combine_libraries, create_universal, create_xcframework};

/// Contents of every placeholder library written in test mode: an empty
/// `ar` archive.
const PLACEHOLDER_LIBRARY: &[u8] = b"!<arch>\n";
const PLACEHOLDER_HEADER: &str = "skbuild_placeholder.h";

/// What a `build` invocation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildTarget {
    Platform(PlatformId),
    /// macOS universal plus iOS simulator and device, bundled.
    XcFramework,
}

impl BuildTarget {
    pub fn platforms(&self) -> Vec<PlatformId> {
        match self {
            BuildTarget::Platform(p) => vec![*p],
            BuildTarget::XcFramework => vec![PlatformId::Mac, PlatformId::Ios],
        }
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildTarget::Platform(p) => write!(f, "{p}"),
            BuildTarget::XcFramework => f.write_str("xcframework"),
        }
    }
}

impl FromStr for BuildTarget {
    type Err = TargetError;

    fn from_str(s: &str) -> std::result::Result<Self, TargetError> {
        if s == "xcframework" {
            return Ok(BuildTarget::XcFramework);
        }
        s.parse::<PlatformId>()
            .map(BuildTarget::Platform)
            .map_err(|e| match e {
                TargetError::UnknownPlatform { name, expected } => TargetError::UnknownPlatform {
                    name,
                    expected: format!("{expected}, xcframework"),
                },
                other => other,
            })
    }
}

/// Everything one pipeline run needs.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub target: BuildTarget,
    pub config: BuildConfig,
    pub source: SourceSpec,
    pub clang_win: String,
    /// User GN overrides per platform, applied last.
    pub overrides: BTreeMap<PlatformId, GnArgs>,
    /// Write `skia-<platform>-<variant>.zip` for each built platform.
    pub zip: bool,
    /// Write `skia-all-platforms-<variant>.zip`.
    pub zip_all: bool,
    /// Write placeholder outputs instead of fetching and compiling.
    pub test_mode: bool,
    pub keep_intermediate: bool,
}

impl PipelineOptions {
    pub fn new(target: BuildTarget, config: BuildConfig) -> Self {
        Self {
            target,
            config,
            source: SourceSpec::default(),
            clang_win: skbuild_targets::gn_args::DEFAULT_CLANG_WIN.to_string(),
            overrides: BTreeMap::new(),
            zip: false,
            zip_all: false,
            test_mode: false,
            keep_intermediate: false,
        }
    }
}

/// A platform's slices with their assembled arguments.
#[derive(Debug, Clone)]
struct PlatformPlan {
    platform: PlatformId,
    configuration: Configuration,
    slices: Vec<(Arch, GnArgs)>,
    /// Merge the slices into one fat library per module.
    universal: bool,
    /// libtool the result into `libSkia.a` for the XCFramework.
    combine: bool,
}

fn plan(opts: &PipelineOptions) -> Result<Vec<PlatformPlan>> {
    let config = &opts.config;
    let both = [Arch::X86_64, Arch::Arm64];
    let layouts: Vec<(PlatformId, Configuration, Vec<Arch>, bool)> = match opts.target {
        BuildTarget::Platform(platform) => {
            let slices = platform.target().build_slices(&config.archs)?;
            let universal = platform == PlatformId::Mac && both.iter().all(|a| slices.contains(a));
            vec![(platform, config.configuration, slices, universal)]
        }
        BuildTarget::XcFramework => {
            if !config.archs.is_empty() || config.configuration.is_debug() {
                warn!("xcframework builds are always release x86_64 + arm64; ignoring --config/--archs");
            }
            vec![
                (PlatformId::Mac, Configuration::Release, both.to_vec(), true),
                (PlatformId::Ios, Configuration::Release, both.to_vec(), false),
            ]
        }
    };
    let combine = opts.target == BuildTarget::XcFramework;

    layouts
        .into_iter()
        .map(|(platform, configuration, archs, universal)| -> Result<PlatformPlan> {
            let overrides = opts.overrides.get(&platform).cloned().unwrap_or_default();
            let slices = archs
                .into_iter()
                .map(|arch| -> Result<(Arch, GnArgs)> {
                    let req = ArgRequest {
                        configuration,
                        platform,
                        arch,
                        variant: config.variant,
                        text_backend: config.text_backend,
                        clang_win: opts.clang_win.clone(),
                        overrides: overrides.clone(),
                    };
                    Ok((arch, assemble(&req)?))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(PlatformPlan {
                platform,
                configuration,
                slices,
                universal,
                combine,
            })
        })
        .collect()
}

/// Run the whole pipeline.
pub fn run(
    ws: &Workspace,
    runner: &mut dyn ProcessRunner,
    opts: &PipelineOptions,
) -> Result<BuildReport> {
    let start = Instant::now();
    let plans = plan(opts)?;
    let variant = opts.config.variant;

    let mut report = BuildReport {
        target: opts.target.to_string(),
        variant,
        revision: opts.config.revision.clone(),
        test_mode: opts.test_mode,
        fetch: None,
        platforms: Vec::new(),
        headers_copied: 0,
        xcframework: None,
        archives: Vec::new(),
        duration_ms: 0,
    };

    if opts.test_mode {
        info!("test mode: writing placeholder outputs");
        for plan in &plans {
            report.platforms.push(write_placeholders(ws, opts, plan)?);
        }
        report.headers_copied = write_placeholder_header(ws)?;
    } else {
        report.fetch = Some(fetch::fetch(
            ws,
            runner,
            &opts.source,
            &opts.config.revision,
            opts.config.shallow,
        )?);
        build_all(ws, runner, opts, &plans, &mut report)?;
    }

    if opts.zip {
        for platform in opts.target.platforms() {
            report.archives.push(archive_platform(ws, platform, variant)?);
        }
    }
    if opts.zip_all {
        report.archives.push(archive_all_platforms(ws, variant)?);
    }

    report.duration_ms = start.elapsed().as_millis() as u64;
    info!("finished {} in {} ms", report.target, report.duration_ms);
    Ok(report)
}

fn build_all(
    ws: &Workspace,
    runner: &mut dyn ProcessRunner,
    opts: &PipelineOptions,
    plans: &[PlatformPlan],
    report: &mut BuildReport,
) -> Result<()> {
    let config = &opts.config;
    let mut combined = Vec::new();
    let mut first_out_dir: Option<PathBuf> = None;
    let mut out_dirs = Vec::new();

    for plan in plans {
        let target = plan.platform.target();
        let module_libs = target.libraries(config.text_backend);
        let mut outputs = Vec::new();
        for (arch, args) in &plan.slices {
            let req = SliceRequest {
                platform: plan.platform,
                configuration: plan.configuration,
                arch: *arch,
                variant: config.variant,
                text_backend: config.text_backend,
                args: args.clone(),
            };
            outputs.push(build_slice(ws, runner, &req)?);
        }
        out_dirs.extend(outputs.iter().map(|o| o.out_dir.clone()));
        if first_out_dir.is_none() {
            first_out_dir = outputs.first().map(|o| o.out_dir.clone());
        }

        let libraries = if plan.universal {
            let dest = ws.lib_dir(plan.platform, config.variant, plan.configuration, None);
            let slice_dirs: Vec<PathBuf> = outputs.iter().map(|o| o.lib_dir.clone()).collect();
            let produced = create_universal(
                runner,
                &slice_dirs,
                &dest,
                &module_libs,
                &target.gpu_libraries(config.variant),
            )?;
            if plan.combine {
                combined.push(combine_libraries(runner, &dest, &module_libs)?);
            }
            produced
        } else {
            if plan.combine {
                for output in &outputs {
                    combined.push(combine_libraries(runner, &output.lib_dir, &module_libs)?);
                }
            }
            outputs.into_iter().flat_map(|o| o.libraries).collect()
        };

        let summary_path = write_summary(ws, config.variant, plan)?;
        report.platforms.push(PlatformReport {
            platform: plan.platform,
            configuration: plan.configuration,
            archs: plan.slices.iter().map(|(a, _)| *a).collect(),
            libraries,
            summary_path,
        });
    }

    let include = ws.include_dir();
    report.headers_copied = package_headers(&ws.source_dir(), &include)?;
    if config.variant == Variant::Gpu {
        if let Some(out_dir) = &first_out_dir {
            report.headers_copied += package_generated_dawn_headers(out_dir, &include)?;
        }
    }

    if opts.target == BuildTarget::XcFramework {
        report.xcframework = Some(create_xcframework(
            runner,
            &combined,
            Some(&include),
            &ws.xcframework_path(),
        )?);
    }

    if !opts.keep_intermediate {
        for dir in &out_dirs {
            remove_dir_if_present(dir)?;
        }
    }
    Ok(())
}

fn write_summary(ws: &Workspace, variant: Variant, plan: &PlatformPlan) -> Result<PathBuf> {
    let summary = GnSummary {
        platform: plan.platform,
        configuration: plan.configuration,
        variant,
        slices: plan.slices.clone(),
    };
    let path = ws.gn_summary_path(plan.platform, variant);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(DriverError::io(parent))?;
    }
    std::fs::write(&path, summary.to_string()).map_err(DriverError::io(&path))?;
    Ok(path)
}

fn write_placeholders(
    ws: &Workspace,
    opts: &PipelineOptions,
    plan: &PlatformPlan,
) -> Result<PlatformReport> {
    let config = &opts.config;
    let target = plan.platform.target();
    let names: Vec<String> = target
        .libraries(config.text_backend)
        .into_iter()
        .chain(target.gpu_libraries(config.variant))
        .collect();

    let dirs: Vec<PathBuf> = if plan.universal {
        vec![ws.lib_dir(plan.platform, config.variant, plan.configuration, None)]
    } else {
        let mut dirs: Vec<PathBuf> = plan
            .slices
            .iter()
            .map(|(arch, _)| ws.lib_dir(plan.platform, config.variant, plan.configuration, Some(*arch)))
            .collect();
        dirs.dedup();
        dirs
    };

    let mut libraries = Vec::new();
    for dir in dirs {
        std::fs::create_dir_all(&dir).map_err(DriverError::io(&dir))?;
        for name in &names {
            let path = dir.join(name);
            std::fs::write(&path, PLACEHOLDER_LIBRARY).map_err(DriverError::io(&path))?;
            libraries.push(path);
        }
    }

    Ok(PlatformReport {
        platform: plan.platform,
        configuration: plan.configuration,
        archs: plan.slices.iter().map(|(a, _)| *a).collect(),
        libraries,
        summary_path: write_summary(ws, config.variant, plan)?,
    })
}

fn write_placeholder_header(ws: &Workspace) -> Result<usize> {
    let include = ws.include_dir();
    std::fs::create_dir_all(&include).map_err(DriverError::io(&include))?;
    let path = include.join(PLACEHOLDER_HEADER);
    std::fs::write(&path, "// Placeholder written by skbuild in test mode.\n")
        .map_err(DriverError::io(&path))?;
    Ok(1)
}

/// Archive `include/` plus one platform's output tree.
pub fn archive_platform(ws: &Workspace, platform: PlatformId, variant: Variant) -> Result<ArchiveInfo> {
    create_archive(
        ws.root(),
        &[ws.include_dir(), ws.platform_dir(platform, variant)],
        &ws.archive_path(platform, variant),
    )
}

/// Archive `include/` plus every platform output tree present for `variant`.
pub fn archive_all_platforms(ws: &Workspace, variant: Variant) -> Result<ArchiveInfo> {
    let mut dirs = vec![ws.include_dir()];
    dirs.extend(PlatformId::ALL.iter().map(|p| ws.platform_dir(*p, variant)));
    create_archive(ws.root(), &dirs, &ws.all_platforms_archive_path(variant))
}

/// Archive whatever output trees already exist: one archive per platform,
/// plus the all-platforms archive when `all` is set.
pub fn archive_existing(ws: &Workspace, variant: Variant, all: bool) -> Result<Vec<ArchiveInfo>> {
    let mut archives = Vec::new();
    for platform in PlatformId::ALL {
        if ws.platform_dir(platform, variant).is_dir() {
            archives.push(archive_platform(ws, platform, variant)?);
        }
    }
    if all {
        archives.push(archive_all_platforms(ws, variant)?);
    }
    if archives.is_empty() {
        return Err(DriverError::NothingToArchive {
            path: ws.root().to_path_buf(),
        });
    }
    Ok(archives)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RecordingRunner;
    use skbuild_targets::TextBackend;

    fn options(target: BuildTarget) -> PipelineOptions {
        PipelineOptions::new(target, BuildConfig::default())
    }

    #[test]
    fn build_target_parsing() {
        assert_eq!(
            "xcframework".parse::<BuildTarget>().unwrap(),
            BuildTarget::XcFramework
        );
        assert_eq!(
            "wasm".parse::<BuildTarget>().unwrap(),
            BuildTarget::Platform(PlatformId::Wasm)
        );
        let err = "beos".parse::<BuildTarget>().unwrap_err();
        assert!(err.to_string().contains("xcframework"));
    }

    #[test]
    fn mac_default_plan_is_universal() {
        let plans = plan(&options(BuildTarget::Platform(PlatformId::Mac))).unwrap();
        assert_eq!(plans.len(), 1);
        assert!(plans[0].universal);
        assert_eq!(plans[0].slices.len(), 2);
    }

    #[test]
    fn single_mac_arch_is_not_universal() {
        let mut opts = options(BuildTarget::Platform(PlatformId::Mac));
        opts.config.archs = vec![Arch::Arm64];
        let plans = plan(&opts).unwrap();
        assert!(!plans[0].universal);
    }

    #[test]
    fn xcframework_plan_forces_release() {
        let mut opts = options(BuildTarget::XcFramework);
        opts.config.configuration = Configuration::Debug;
        let plans = plan(&opts).unwrap();
        assert_eq!(plans.len(), 2);
        assert!(plans.iter().all(|p| p.configuration == Configuration::Release && p.combine));
        assert_eq!(plans[1].platform, PlatformId::Ios);
    }

    #[test]
    fn overrides_reach_the_plan() {
        let mut opts = options(BuildTarget::Platform(PlatformId::Linux));
        let mut extra = GnArgs::new();
        extra.set("skia_use_x11", false);
        opts.overrides.insert(PlatformId::Linux, extra);
        let plans = plan(&opts).unwrap();
        let (_, args) = &plans[0].slices[0];
        assert_eq!(
            args.get("skia_use_x11"),
            Some(&skbuild_targets::GnValue::Bool(false))
        );
    }

    #[test]
    fn bad_arch_spawns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let mut opts = options(BuildTarget::Platform(PlatformId::Ios));
        opts.config.archs = vec![Arch::X64];
        let mut runner = RecordingRunner::new();

        let err = run(&ws, &mut runner, &opts).unwrap_err();
        assert!(matches!(err, DriverError::Config(TargetError::InvalidArch { .. })));
        assert!(runner.invocations.is_empty());
    }

    #[test]
    fn test_mode_writes_placeholders_without_processes() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let mut opts = options(BuildTarget::Platform(PlatformId::Win));
        opts.test_mode = true;
        opts.config.variant = Variant::Cpu;
        opts.config.text_backend = TextBackend::Libgrapheme;
        let mut runner = RecordingRunner::new();

        let report = run(&ws, &mut runner, &opts).unwrap();
        assert!(runner.invocations.is_empty());
        let lib_dir = ws.lib_dir(PlatformId::Win, Variant::Cpu, Configuration::Release, Some(Arch::X64));
        assert!(lib_dir.join("skia.lib").is_file());
        assert!(lib_dir.join("skunicode_libgrapheme.lib").is_file());
        assert!(!lib_dir.join("dawn_combined.lib").exists());
        assert_eq!(report.platforms[0].libraries.len(), 8);
        assert!(ws.gn_summary_path(PlatformId::Win, Variant::Cpu).is_file());
    }

    #[test]
    fn archive_existing_requires_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        assert!(archive_existing(&ws, Variant::Gpu, false).is_err());
    }
}
