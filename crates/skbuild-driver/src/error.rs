//! Driver errors.

use std::path::PathBuf;

use skbuild_targets::TargetError;
use thiserror::Error;

/// Errors that can occur while fetching, building or packaging.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Invalid platform, architecture or GN override.
    #[error(transparent)]
    Config(#[from] TargetError),

    /// The program could not be started at all.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited unsuccessfully.
    #[error("{program} failed ({status}): {command}")]
    ToolFailed {
        program: String,
        status: String,
        command: String,
    },

    #[error("{library} was not produced in {}", dir.display())]
    MissingLibrary { library: String, dir: PathBuf },

    #[error("no libraries to combine in {}", dir.display())]
    NothingToCombine { dir: PathBuf },

    #[error("nothing to archive: {} does not exist", path.display())]
    NothingToArchive { path: PathBuf },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A directory cannot be placed on `PATH`.
    #[error("cannot add {} to PATH: {source}", path.display())]
    PathEntry {
        path: PathBuf,
        #[source]
        source: std::env::JoinPathsError,
    },

    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl DriverError {
    /// Wrap an I/O error with the path it happened at.
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> DriverError {
        let path = path.into();
        move |source| DriverError::Io { path, source }
    }
}

/// Result type for driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;
