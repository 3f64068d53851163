//! Universal binaries, combined libraries and the XCFramework bundle.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{DriverError, Result};
use crate::layout::remove_dir_if_present;
use crate::runner::{Invocation, ProcessRunner};

/// Name of the single static library `libtool` produces per slice.
pub const COMBINED_LIBRARY: &str = "libSkia.a";

/// `lipo` each library's slices into `dest`, then drop the slice directories.
///
/// `required` libraries are handed to lipo as-is, so a missing slice is a
/// tool failure. `optional` libraries (Dawn) are merged when every slice
/// has them and copied when only one does.
pub fn create_universal(
    runner: &mut dyn ProcessRunner,
    slice_dirs: &[PathBuf],
    dest: &Path,
    required: &[String],
    optional: &[String],
) -> Result<Vec<PathBuf>> {
    info!("creating universal libraries in {}", dest.display());
    std::fs::create_dir_all(dest).map_err(DriverError::io(dest))?;
    let mut produced = Vec::new();

    for lib in required {
        let inputs: Vec<PathBuf> = slice_dirs.iter().map(|d| d.join(lib)).collect();
        produced.push(lipo(runner, &inputs, &dest.join(lib))?);
    }

    for lib in optional {
        let inputs: Vec<PathBuf> = slice_dirs
            .iter()
            .map(|d| d.join(lib))
            .filter(|p| p.is_file())
            .collect();
        let output = dest.join(lib);
        match inputs.len() {
            0 => {}
            1 => {
                warn!("only one slice of {lib} exists; copying it");
                std::fs::copy(&inputs[0], &output).map_err(DriverError::io(&output))?;
                produced.push(output);
            }
            _ => produced.push(lipo(runner, &inputs, &output)?),
        }
    }

    for dir in slice_dirs {
        remove_dir_if_present(dir)?;
    }
    Ok(produced)
}

fn lipo(runner: &mut dyn ProcessRunner, inputs: &[PathBuf], output: &Path) -> Result<PathBuf> {
    let mut inv = Invocation::new("lipo").arg("-create");
    for input in inputs {
        inv = inv.path_arg(input);
    }
    runner.run(&inv.arg("-output").path_arg(output))?;
    Ok(output.to_path_buf())
}

/// `libtool -static` the libraries present in `lib_dir` into `libSkia.a`.
pub fn combine_libraries(
    runner: &mut dyn ProcessRunner,
    lib_dir: &Path,
    libraries: &[String],
) -> Result<PathBuf> {
    let inputs: Vec<PathBuf> = libraries
        .iter()
        .map(|lib| lib_dir.join(lib))
        .filter(|p| p.is_file())
        .collect();
    if inputs.is_empty() {
        return Err(DriverError::NothingToCombine {
            dir: lib_dir.to_path_buf(),
        });
    }

    let output = lib_dir.join(COMBINED_LIBRARY);
    let mut inv = Invocation::new("libtool")
        .arg("-static")
        .arg("-o")
        .path_arg(&output);
    for input in &inputs {
        inv = inv.path_arg(input);
    }
    runner.run(&inv)?;
    info!("combined {} libraries into {}", inputs.len(), output.display());
    Ok(output)
}

/// Bundle combined libraries into an XCFramework, replacing any previous one.
pub fn create_xcframework(
    runner: &mut dyn ProcessRunner,
    libraries: &[PathBuf],
    headers: Option<&Path>,
    output: &Path,
) -> Result<PathBuf> {
    remove_dir_if_present(output)?;
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).map_err(DriverError::io(parent))?;
    }

    let mut inv = Invocation::new("xcodebuild").arg("-create-xcframework");
    for lib in libraries {
        inv = inv.arg("-library").path_arg(lib);
        if let Some(headers) = headers {
            inv = inv.arg("-headers").path_arg(headers);
        }
    }
    runner.run(&inv.arg("-output").path_arg(output))?;
    info!("created {}", output.display());
    Ok(output.to_path_buf())
}
