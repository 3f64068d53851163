//! Per-invocation build configuration.
//!
//! A [`BuildConfig`] is assembled once from the command line and the
//! optional `skbuild.toml`, and does not change for the rest of the run.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TargetError};
use crate::platform::Arch;

/// Build configuration (debug or release).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Configuration {
    Debug,
    #[default]
    Release,
}

impl Configuration {
    /// Directory name used in the output tree (`Debug` / `Release`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Configuration::Debug => "Debug",
            Configuration::Release => "Release",
        }
    }

    pub fn is_debug(&self) -> bool {
        matches!(self, Configuration::Debug)
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Configuration {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Configuration::Debug),
            "release" => Ok(Configuration::Release),
            _ => Err(TargetError::InvalidValue {
                field: "configuration",
                value: s.to_string(),
                expected: "debug, release",
            }),
        }
    }
}

/// Library variant: with or without GPU backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// No GPU backends (raster only).
    Cpu,
    /// Graphite plus the platform GPU APIs (Metal, Dawn, Direct3D, Vulkan).
    #[default]
    Gpu,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Cpu => "cpu",
            Variant::Gpu => "gpu",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Variant::Cpu),
            "gpu" => Ok(Variant::Gpu),
            _ => Err(TargetError::InvalidValue {
                field: "variant",
                value: s.to_string(),
                expected: "cpu, gpu",
            }),
        }
    }
}

/// Unicode / text-shaping backend linked into `skunicode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextBackend {
    #[default]
    Icu,
    Libgrapheme,
}

impl TextBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextBackend::Icu => "icu",
            TextBackend::Libgrapheme => "libgrapheme",
        }
    }

    /// Name stem of the `skunicode` backend library.
    pub fn unicode_library(&self) -> &'static str {
        match self {
            TextBackend::Icu => "skunicode_icu",
            TextBackend::Libgrapheme => "skunicode_libgrapheme",
        }
    }
}

impl fmt::Display for TextBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TextBackend {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "icu" => Ok(TextBackend::Icu),
            "libgrapheme" => Ok(TextBackend::Libgrapheme),
            _ => Err(TargetError::InvalidValue {
                field: "text backend",
                value: s.to_string(),
                expected: "icu, libgrapheme",
            }),
        }
    }
}

/// Settings fixed for the duration of one build invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Debug or release.
    pub configuration: Configuration,
    /// Branch, tag or revision of the library to check out.
    pub revision: String,
    /// Requested architectures. Empty means the platform defaults.
    pub archs: Vec<Arch>,
    /// Clone with `--depth 1`.
    pub shallow: bool,
    pub variant: Variant,
    pub text_backend: TextBackend,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            configuration: Configuration::Release,
            revision: "main".to_string(),
            archs: Vec::new(),
            shallow: false,
            variant: Variant::Gpu,
            text_backend: TextBackend::Icu,
        }
    }
}

/// Parse a comma-separated architecture list (`"x86_64,arm64"`).
pub fn parse_arch_list(list: &str) -> Result<Vec<Arch>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Arch::from_str)
        .collect()
}
