//! Build driver: `gn gen`, `ninja`, and collecting the produced libraries.

use std::path::{Path, PathBuf};

use skbuild_targets::{Arch, Configuration, GnArgs, PlatformId, TextBackend, Variant};
use tracing::{debug, info, warn};

use crate::error::{DriverError, Result};
use crate::layout::Workspace;
use crate::runner::{Invocation, ProcessRunner};

/// Subdirectory of a build directory where Dawn's combined library lands.
const DAWN_SUBDIR: &str = "cmake_dawn";

/// One architecture slice to build.
#[derive(Debug, Clone)]
pub struct SliceRequest {
    pub platform: PlatformId,
    pub configuration: Configuration,
    pub arch: Arch,
    pub variant: Variant,
    pub text_backend: TextBackend,
    /// Fully assembled GN arguments for this slice.
    pub args: GnArgs,
}

/// Libraries produced for one slice and where they were placed.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub platform: PlatformId,
    pub arch: Arch,
    /// Build directory the slice was compiled in.
    pub out_dir: PathBuf,
    /// Directory the libraries were moved to.
    pub lib_dir: PathBuf,
    pub libraries: Vec<PathBuf>,
    pub args: GnArgs,
}

/// Generate, compile and collect one slice.
pub fn build_slice(
    ws: &Workspace,
    runner: &mut dyn ProcessRunner,
    req: &SliceRequest,
) -> Result<BuildOutput> {
    let out_dir = ws.out_dir(req.platform, req.configuration, req.arch, req.variant);
    info!(
        "building {} {} {} ({})",
        req.platform, req.configuration, req.arch, req.variant
    );
    generate(ws, runner, &out_dir, &req.args)?;
    compile(runner, req, &out_dir)?;

    let lib_dir = ws.lib_dir(req.platform, req.variant, req.configuration, Some(req.arch));
    let libraries = collect_libraries(req, &out_dir, &lib_dir)?;
    Ok(BuildOutput {
        platform: req.platform,
        arch: req.arch,
        out_dir,
        lib_dir,
        libraries,
        args: req.args.clone(),
    })
}

/// `<checkout>/bin/gn gen <out> --args=<args>`, run from the checkout.
pub fn generate(
    ws: &Workspace,
    runner: &mut dyn ProcessRunner,
    out_dir: &Path,
    args: &GnArgs,
) -> Result<()> {
    debug!("gn args for {}:\n{}", out_dir.display(), args.render());
    runner.run(
        &Invocation::new(ws.gn_path().display().to_string())
            .arg("gen")
            .path_arg(out_dir)
            .arg(format!("--args={}", args.render()))
            .current_dir(ws.source_dir())
            .env("PATH", ws.tool_path()?),
    )
}

/// Ninja targets for a slice. Dawn is not listed; it builds as a dependency.
pub fn ninja_targets(req: &SliceRequest) -> Vec<String> {
    let target = req.platform.target();
    target
        .libraries(req.text_backend)
        .iter()
        .map(|lib| target.ninja_target(lib))
        .collect()
}

/// `ninja -C <out> <targets...>`.
pub fn compile(runner: &mut dyn ProcessRunner, req: &SliceRequest, out_dir: &Path) -> Result<()> {
    runner.run(
        &Invocation::new("ninja")
            .arg("-C")
            .path_arg(out_dir)
            .args(ninja_targets(req)),
    )
}

/// Move the produced libraries out of the build directory.
///
/// Every module library must exist. Dawn is looked up in `cmake_dawn/`
/// first and then the build directory itself; if it is missing the build
/// continues with a warning.
pub fn collect_libraries(
    req: &SliceRequest,
    out_dir: &Path,
    lib_dir: &Path,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(lib_dir).map_err(DriverError::io(lib_dir))?;
    let target = req.platform.target();
    let mut placed = Vec::new();

    for lib in target.libraries(req.text_backend) {
        let src = out_dir.join(&lib);
        if !src.is_file() {
            return Err(DriverError::MissingLibrary {
                library: lib,
                dir: out_dir.to_path_buf(),
            });
        }
        placed.push(move_file(&src, &lib_dir.join(&lib))?);
    }

    for lib in target.gpu_libraries(req.variant) {
        let candidates = [out_dir.join(DAWN_SUBDIR).join(&lib), out_dir.join(&lib)];
        match candidates.iter().find(|p| p.is_file()) {
            Some(src) => placed.push(move_file(src, &lib_dir.join(&lib))?),
            None => warn!("Dawn library {lib} not found in {}", out_dir.display()),
        }
    }

    info!("placed {} libraries in {}", placed.len(), lib_dir.display());
    Ok(placed)
}

/// Copy then delete, which also works across filesystems.
pub(crate) fn move_file(src: &Path, dest: &Path) -> Result<PathBuf> {
    std::fs::copy(src, dest).map_err(DriverError::io(dest))?;
    std::fs::remove_file(src).map_err(DriverError::io(src))?;
    Ok(dest.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RecordingRunner;
    use skbuild_targets::{assemble, ArgRequest};

    fn request(platform: PlatformId, arch: Arch, variant: Variant) -> SliceRequest {
        let mut arg_req = ArgRequest::new(Configuration::Release, platform, arch);
        arg_req.variant = variant;
        SliceRequest {
            platform,
            configuration: Configuration::Release,
            arch,
            variant,
            text_backend: TextBackend::Icu,
            args: assemble(&arg_req).unwrap(),
        }
    }

    fn write_outputs(dir: &Path, names: &[String]) {
        std::fs::create_dir_all(dir).unwrap();
        for name in names {
            std::fs::write(dir.join(name), b"!<arch>\n").unwrap();
        }
    }

    #[test]
    fn windows_targets_drop_lib_suffix() {
        let req = request(PlatformId::Win, Arch::X64, Variant::Gpu);
        let targets = ninja_targets(&req);
        assert!(targets.contains(&"skia".to_string()));
        assert!(targets.iter().all(|t| !t.ends_with(".lib")));
    }

    #[test]
    fn gn_gen_runs_in_checkout_with_rendered_args() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let req = request(PlatformId::Linux, Arch::X64, Variant::Cpu);
        let out = ws.out_dir(req.platform, req.configuration, req.arch, req.variant);
        let mut runner = RecordingRunner::new();

        generate(&ws, &mut runner, &out, &req.args).unwrap();
        let inv = &runner.invocations[0];
        assert_eq!(inv.program, ws.gn_path().display().to_string());
        assert_eq!(inv.cwd, Some(ws.source_dir()));
        let args = inv.args.iter().find(|a| a.starts_with("--args=")).unwrap();
        assert!(args.contains("target_cpu = \"x64\""));
        assert!(args.contains("skia_enable_gpu = false"));
    }

    #[test]
    fn collect_moves_libraries_and_dawn() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(PlatformId::Linux, Arch::X64, Variant::Gpu);
        let out = dir.path().join("out");
        let dest = dir.path().join("lib");
        let target = req.platform.target();
        write_outputs(&out, &target.libraries(req.text_backend));
        write_outputs(&out.join(DAWN_SUBDIR), &target.gpu_libraries(req.variant));

        let placed = collect_libraries(&req, &out, &dest).unwrap();
        assert_eq!(placed.len(), 9);
        assert!(dest.join("libdawn_combined.a").is_file());
        assert!(!out.join("libskia.a").exists());
    }

    #[test]
    fn missing_dawn_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(PlatformId::Mac, Arch::Arm64, Variant::Gpu);
        let out = dir.path().join("out");
        write_outputs(&out, &req.platform.target().libraries(req.text_backend));

        let placed = collect_libraries(&req, &out, &dir.path().join("lib")).unwrap();
        assert_eq!(placed.len(), 8);
    }

    #[test]
    fn missing_core_library_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(PlatformId::Linux, Arch::X64, Variant::Cpu);
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();

        let err = collect_libraries(&req, &out, &dir.path().join("lib")).unwrap_err();
        assert!(matches!(err, DriverError::MissingLibrary { .. }));
    }

    #[test]
    fn failed_ninja_stops_the_slice() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let req = request(PlatformId::Linux, Arch::X64, Variant::Cpu);
        let mut runner = RecordingRunner::new().fail_on("ninja");

        assert!(build_slice(&ws, &mut runner, &req).is_err());
        let gn = ws.gn_path().display().to_string();
        assert_eq!(runner.programs(), vec![gn.as_str(), "ninja"]);
    }

    #[test]
    fn relative_workspace_gives_absolute_tool_paths() {
        let ws = Workspace::new("w");
        let req = request(PlatformId::Linux, Arch::X64, Variant::Cpu);
        let out = ws.out_dir(req.platform, req.configuration, req.arch, req.variant);
        let mut runner = RecordingRunner::new();

        generate(&ws, &mut runner, &out, &req.args).unwrap();
        compile(&mut runner, &req, &out).unwrap();

        let gn = &runner.invocations[0];
        assert!(Path::new(&gn.program).is_absolute());
        assert!(Path::new(gn.arg_after("gen").unwrap()).is_absolute());
        let path_env = &gn.env.iter().find(|(k, _)| k == "PATH").unwrap().1;
        assert!(std::env::split_paths(path_env).next().unwrap().is_absolute());

        let ninja = &runner.invocations[1];
        assert_eq!(Path::new(ninja.arg_after("-C").unwrap()), out.as_path());
        assert!(out.is_absolute());
    }
}
