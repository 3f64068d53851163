//! Packager: headers, build summaries, zip archives and checksums.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{DriverError, Result};

/// Header directories copied from the checkout, relative to its root.
pub const HEADER_DIRS: [&str; 13] = [
    "include",
    "modules/skottie",
    "modules/skparagraph",
    "modules/skshaper",
    "modules/skresources",
    "modules/skunicode",
    "modules/skcms",
    "modules/svg",
    "src/core",
    "src/base",
    "src/utils",
    "src/xml",
    "third_party/externals/dawn/include",
];

/// Path components never packaged.
const EXCLUDED_COMPONENTS: [&str; 1] = ["android"];

/// Generated Dawn header directories, relative to a build directory.
const GENERATED_DAWN_HEADERS: [&str; 2] = ["dawn", "webgpu"];

fn is_header(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("h")
}

fn is_excluded(rel: &Path) -> bool {
    rel.components()
        .any(|c| EXCLUDED_COMPONENTS.iter().any(|x| c.as_os_str() == *x))
}

fn copy_file(src: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(DriverError::io(parent))?;
    }
    std::fs::copy(src, dest).map_err(DriverError::io(dest))?;
    Ok(())
}

/// Copy every `*.h` under [`HEADER_DIRS`] into `dest`, keeping paths
/// relative to the checkout. Returns the number of headers copied.
pub fn package_headers(source: &Path, dest: &Path) -> Result<usize> {
    info!("packaging headers into {}", dest.display());
    let mut copied = 0;
    for dir in HEADER_DIRS {
        let root = source.join(dir);
        if !root.is_dir() {
            debug!("header dir {} absent", root.display());
            continue;
        }
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() || !is_header(entry.path()) {
                continue;
            }
            let rel = entry.path().strip_prefix(source).unwrap_or(entry.path());
            if is_excluded(rel) {
                continue;
            }
            copy_file(entry.path(), &dest.join(rel))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Copy headers Dawn generates at build time (`gen/third_party/dawn/include`)
/// into `dest/dawn` and `dest/webgpu`.
pub fn package_generated_dawn_headers(out_dir: &Path, dest: &Path) -> Result<usize> {
    let gen = out_dir
        .join("gen")
        .join("third_party")
        .join("dawn")
        .join("include");
    let mut copied = 0;
    for sub in GENERATED_DAWN_HEADERS {
        let dir = gen.join(sub);
        if !dir.is_dir() {
            warn!("generated headers not found at {}", dir.display());
            continue;
        }
        for entry in WalkDir::new(&dir).max_depth(1).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() && is_header(entry.path()) {
                copy_file(entry.path(), &dest.join(sub).join(entry.file_name()))?;
                copied += 1;
            }
        }
    }
    Ok(copied)
}

/// Summary of a created archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveInfo {
    pub path: PathBuf,
    pub files: usize,
    pub sha256: String,
    pub checksum_path: PathBuf,
}

/// Zip the given directories (each must live under `base`) into `archive`,
/// naming entries relative to `base`, then write a `.sha256` sidecar.
///
/// Missing directories other than the first are skipped with a warning; a
/// missing first directory is an error.
pub fn create_archive(base: &Path, dirs: &[PathBuf], archive: &Path) -> Result<ArchiveInfo> {
    if let Some(first) = dirs.first() {
        if !first.is_dir() {
            return Err(DriverError::NothingToArchive {
                path: first.clone(),
            });
        }
    }

    info!("writing {}", archive.display());
    let file = File::create(archive).map_err(DriverError::io(archive))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut files = 0;

    for dir in dirs {
        if !dir.is_dir() {
            warn!("{} not found; skipping", dir.display());
            continue;
        }
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry.path().strip_prefix(base).unwrap_or(entry.path());
            zip.start_file(entry_name(rel), options)?;
            let mut src = File::open(entry.path()).map_err(DriverError::io(entry.path()))?;
            std::io::copy(&mut src, &mut zip).map_err(DriverError::io(entry.path()))?;
            files += 1;
        }
    }
    zip.finish()?.flush().map_err(DriverError::io(archive))?;

    let sha256 = sha256_file(archive)?;
    let checksum_path = write_checksum(archive, &sha256)?;
    Ok(ArchiveInfo {
        path: archive.to_path_buf(),
        files,
        sha256,
        checksum_path,
    })
}

/// Archive entry names always use `/`.
fn entry_name(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// SHA-256 of a file as lowercase hex.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(DriverError::io(path))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut BufReader::new(file), &mut hasher).map_err(DriverError::io(path))?;
    Ok(hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Write `<archive>.sha256` in `sha256sum` format.
fn write_checksum(archive: &Path, sha256: &str) -> Result<PathBuf> {
    let mut name = archive.as_os_str().to_owned();
    name.push(".sha256");
    let path = PathBuf::from(name);
    let file_name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    std::fs::write(&path, format!("{sha256}  {file_name}\n")).map_err(DriverError::io(&path))?;
    Ok(path)
}
