//! Static platform table.
//!
//! Each [`PlatformTarget`] describes one output platform: which
//! architectures may be requested, which are built by default, the minimum
//! OS version baked into compiler flags and how static libraries are named.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::{TextBackend, Variant};
use crate::error::{Result, TargetError};

/// Supported platform identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformId {
    Mac,
    Ios,
    Win,
    Linux,
    Wasm,
    Visionos,
}

impl PlatformId {
    /// Every platform, in table order.
    pub const ALL: [PlatformId; 6] = [
        PlatformId::Mac,
        PlatformId::Ios,
        PlatformId::Win,
        PlatformId::Linux,
        PlatformId::Wasm,
        PlatformId::Visionos,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformId::Mac => "mac",
            PlatformId::Ios => "ios",
            PlatformId::Win => "win",
            PlatformId::Linux => "linux",
            PlatformId::Wasm => "wasm",
            PlatformId::Visionos => "visionos",
        }
    }

    /// The static table entry for this platform.
    pub fn target(&self) -> &'static PlatformTarget {
        TARGETS
            .iter()
            .find(|t| t.id == *self)
            .unwrap_or(&TARGETS[0])
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformId {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self> {
        PlatformId::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| TargetError::UnknownPlatform {
                name: s.to_string(),
                expected: join(PlatformId::ALL.iter().map(|p| p.as_str())),
            })
    }
}

/// Architecture names as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Arch {
    #[serde(rename = "x86_64")]
    X86_64,
    #[serde(rename = "arm64")]
    Arm64,
    /// Apple fat binary: expands to `x86_64` + `arm64`.
    #[serde(rename = "universal")]
    Universal,
    #[serde(rename = "x64")]
    X64,
    #[serde(rename = "Win32")]
    Win32,
    #[serde(rename = "wasm32")]
    Wasm32,
}

impl Arch {
    const ALL: [Arch; 6] = [
        Arch::X86_64,
        Arch::Arm64,
        Arch::Universal,
        Arch::X64,
        Arch::Win32,
        Arch::Wasm32,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Arm64 => "arm64",
            Arch::Universal => "universal",
            Arch::X64 => "x64",
            Arch::Win32 => "Win32",
            Arch::Wasm32 => "wasm32",
        }
    }

    /// The slices a requested architecture is built as.
    pub fn slices(&self) -> &'static [Arch] {
        match self {
            Arch::Universal => &[Arch::X86_64, Arch::Arm64],
            Arch::X86_64 => &[Arch::X86_64],
            Arch::Arm64 => &[Arch::Arm64],
            Arch::X64 => &[Arch::X64],
            Arch::Win32 => &[Arch::Win32],
            Arch::Wasm32 => &[Arch::Wasm32],
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Arch {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self> {
        Arch::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| TargetError::InvalidValue {
                field: "architecture",
                value: s.to_string(),
                expected: "x86_64, arm64, universal, x64, Win32, wasm32",
            })
    }
}

/// Static-library naming convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibStyle {
    /// `libname.a`
    Unix,
    /// `name.lib`
    Msvc,
}

/// One row of the platform table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformTarget {
    pub id: PlatformId,
    /// One-line human description.
    pub description: &'static str,
    /// Architectures accepted on the command line.
    pub allowed_archs: &'static [Arch],
    /// Architectures built when none are requested.
    pub default_archs: &'static [Arch],
    /// Minimum OS version passed to the compiler, if the platform has one.
    pub min_os_version: Option<&'static str>,
    pub lib_style: LibStyle,
    /// Apple platforms can take part in an XCFramework.
    pub apple: bool,
    /// Whether the gpu variant links Dawn's combined library.
    pub links_dawn: bool,
}

static TARGETS: [PlatformTarget; 6] = [
    PlatformTarget {
        id: PlatformId::Mac,
        description: "macOS (Metal + Dawn, universal binaries)",
        allowed_archs: &[Arch::X86_64, Arch::Arm64, Arch::Universal],
        default_archs: &[Arch::Universal],
        min_os_version: Some("10.15"),
        lib_style: LibStyle::Unix,
        apple: true,
        links_dawn: true,
    },
    PlatformTarget {
        id: PlatformId::Ios,
        description: "iOS (Metal; x86_64 simulator, arm64 device)",
        allowed_archs: &[Arch::X86_64, Arch::Arm64],
        default_archs: &[Arch::X86_64, Arch::Arm64],
        min_os_version: Some("13.0"),
        lib_style: LibStyle::Unix,
        apple: true,
        links_dawn: false,
    },
    PlatformTarget {
        id: PlatformId::Win,
        description: "Windows (Direct3D + Dawn, clang-cl)",
        allowed_archs: &[Arch::X64, Arch::Win32],
        default_archs: &[Arch::X64],
        min_os_version: None,
        lib_style: LibStyle::Msvc,
        apple: false,
        links_dawn: true,
    },
    PlatformTarget {
        id: PlatformId::Linux,
        description: "Linux (Vulkan + Dawn, X11)",
        allowed_archs: &[Arch::X64, Arch::Arm64],
        default_archs: &[Arch::X64],
        min_os_version: None,
        lib_style: LibStyle::Unix,
        apple: false,
        links_dawn: true,
    },
    PlatformTarget {
        id: PlatformId::Wasm,
        description: "WebAssembly (Emscripten; WebGL + browser WebGPU)",
        allowed_archs: &[Arch::Wasm32],
        default_archs: &[Arch::Wasm32],
        min_os_version: None,
        lib_style: LibStyle::Unix,
        apple: false,
        links_dawn: false,
    },
    PlatformTarget {
        id: PlatformId::Visionos,
        description: "visionOS (Metal, arm64 device)",
        allowed_archs: &[Arch::Arm64],
        default_archs: &[Arch::Arm64],
        min_os_version: Some("1.0"),
        lib_style: LibStyle::Unix,
        apple: true,
        links_dawn: false,
    },
];

/// Name stems of the module libraries every platform builds, minus the
/// unicode backend which depends on [`TextBackend`].
const LIBRARY_STEMS: [&str; 7] = [
    "skia",
    "skottie",
    "skshaper",
    "sksg",
    "skparagraph",
    "svg",
    "skunicode_core",
];

const DAWN_STEM: &str = "dawn_combined";

impl PlatformTarget {
    /// Reject an architecture that is not on this platform's allow-list.
    pub fn validate_arch(&self, arch: Arch) -> Result<()> {
        if self.allowed_archs.contains(&arch) {
            Ok(())
        } else {
            Err(TargetError::InvalidArch {
                platform: self.id.to_string(),
                arch: arch.to_string(),
                allowed: join(self.allowed_archs.iter().map(|a| a.as_str())),
            })
        }
    }

    /// Validate a requested architecture list, falling back to the defaults
    /// when it is empty. Every entry is checked before anything is returned.
    pub fn resolve_archs(&self, requested: &[Arch]) -> Result<Vec<Arch>> {
        for arch in requested {
            self.validate_arch(*arch)?;
        }
        if requested.is_empty() {
            Ok(self.default_archs.to_vec())
        } else {
            Ok(requested.to_vec())
        }
    }

    /// Expand requested architectures into the concrete slices to compile,
    /// dropping duplicates while keeping first-seen order.
    pub fn build_slices(&self, requested: &[Arch]) -> Result<Vec<Arch>> {
        let mut slices = Vec::new();
        for arch in self.resolve_archs(requested)? {
            for slice in arch.slices() {
                if !slices.contains(slice) {
                    slices.push(*slice);
                }
            }
        }
        Ok(slices)
    }

    /// File name of a static library with the given stem.
    pub fn library_file(&self, stem: &str) -> String {
        match self.lib_style {
            LibStyle::Unix => format!("lib{stem}.a"),
            LibStyle::Msvc => format!("{stem}.lib"),
        }
    }

    /// Module libraries produced by ninja for this platform.
    pub fn libraries(&self, text_backend: TextBackend) -> Vec<String> {
        LIBRARY_STEMS
            .iter()
            .copied()
            .chain(std::iter::once(text_backend.unicode_library()))
            .map(|stem| self.library_file(stem))
            .collect()
    }

    /// Extra libraries linked by the given variant (Dawn for gpu builds).
    pub fn gpu_libraries(&self, variant: Variant) -> Vec<String> {
        if variant == Variant::Gpu && self.links_dawn {
            vec![self.library_file(DAWN_STEM)]
        } else {
            Vec::new()
        }
    }

    /// Ninja target name for a library file (`skia.lib` builds as `skia`).
    pub fn ninja_target(&self, library_file: &str) -> String {
        match self.lib_style {
            LibStyle::Msvc => library_file
                .strip_suffix(".lib")
                .unwrap_or(library_file)
                .to_string(),
            LibStyle::Unix => library_file.to_string(),
        }
    }
}

/// List all platforms with their descriptions.
pub fn builtin_targets() -> Vec<(&'static str, &'static str)> {
    TARGETS
        .iter()
        .map(|t| (t.id.as_str(), t.description))
        .collect()
}

fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.collect::<Vec<_>>().join(", ")
}
