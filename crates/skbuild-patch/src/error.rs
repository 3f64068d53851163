//! Patch errors.

use std::path::PathBuf;

/// Errors raised while loading or applying patch sets.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// A file the patch set targets does not exist.
    #[error("patch target not found: {}", path.display())]
    MissingFile { path: PathBuf },

    /// A rewrite's anchor did not match; the file was left unchanged.
    #[error("{}: {rewrite} did not match; upstream source may have changed", path.display())]
    AnchorNotFound { path: PathBuf, rewrite: String },

    /// All rewrites matched but the result still lacks the signature.
    #[error("{}: patched text does not contain signature '{signature}'", path.display())]
    SignatureMissing { path: PathBuf, signature: String },

    /// A rewrite pattern is not a valid regular expression.
    #[error("invalid pattern in {rewrite}: {source}")]
    InvalidPattern {
        rewrite: String,
        #[source]
        source: regex::Error,
    },

    #[error("unknown patch set: '{name}' (available: {available})")]
    UnknownSet { name: String, available: String },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for patch operations.
pub type Result<T> = std::result::Result<T, PatchError>;
