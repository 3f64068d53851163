//! GN argument tables and the merge function that assembles them.
//!
//! Arguments are built in layers, each overlaying the previous one with
//! last-writer-wins semantics:
//!
//! 1. basic (compiler selection)
//! 2. configuration base (debug, or the shared release table)
//! 3. platform table for the variant
//! 4. cpu-only table (cpu variant only)
//! 5. architecture table (`target_cpu` and friends)
//! 6. user overrides
//!
//! [`GnArgs`] keeps insertion order and never holds a key twice, so the
//! rendered `--args=` string is identical for identical inputs.

use std::fmt;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::config::{Configuration, TextBackend, Variant};
use crate::error::{Result, TargetError};
use crate::platform::{Arch, PlatformId};

/// Default clang-cl install location used by Windows builds.
pub const DEFAULT_CLANG_WIN: &str = "C:\\Program Files\\LLVM";

/// A single GN value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GnValue {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
}

impl GnValue {
    /// Convert a TOML value from the configuration file.
    pub fn from_toml(key: &str, value: &toml::Value) -> Result<Self> {
        match value {
            toml::Value::Boolean(b) => Ok(GnValue::Bool(*b)),
            toml::Value::Integer(i) => Ok(GnValue::Int(*i)),
            toml::Value::String(s) => Ok(GnValue::Str(s.clone())),
            toml::Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    toml::Value::String(s) => Ok(s.clone()),
                    other => Err(TargetError::UnsupportedGnValue {
                        key: key.to_string(),
                        detail: format!("list items must be strings, found {}", other.type_str()),
                    }),
                })
                .collect::<Result<Vec<_>>>()
                .map(GnValue::List),
            other => Err(TargetError::UnsupportedGnValue {
                key: key.to_string(),
                detail: format!("{} values have no GN equivalent", other.type_str()),
            }),
        }
    }
}

fn write_gn_string(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' | '\\' | '$' => write!(f, "\\{c}")?,
            _ => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

impl fmt::Display for GnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GnValue::Bool(b) => write!(f, "{b}"),
            GnValue::Int(i) => write!(f, "{i}"),
            GnValue::Str(s) => write_gn_string(f, s),
            GnValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_gn_string(f, item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for GnValue {
    fn from(b: bool) -> Self {
        GnValue::Bool(b)
    }
}

impl From<i32> for GnValue {
    fn from(i: i32) -> Self {
        GnValue::Int(i64::from(i))
    }
}

impl From<i64> for GnValue {
    fn from(i: i64) -> Self {
        GnValue::Int(i)
    }
}

impl From<&str> for GnValue {
    fn from(s: &str) -> Self {
        GnValue::Str(s.to_string())
    }
}

impl From<String> for GnValue {
    fn from(s: String) -> Self {
        GnValue::Str(s)
    }
}

impl From<Vec<String>> for GnValue {
    fn from(items: Vec<String>) -> Self {
        GnValue::List(items)
    }
}

impl From<&[&str]> for GnValue {
    fn from(items: &[&str]) -> Self {
        GnValue::List(items.iter().map(|s| s.to_string()).collect())
    }
}

/// Ordered, duplicate-free GN argument table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GnArgs {
    entries: Vec<(String, GnValue)>,
}

impl GnArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`. An existing entry keeps its position and takes the new value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<GnValue>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&GnValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &GnValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Apply every entry of `other` on top of `self`; `other` wins on conflicts.
    pub fn overlay(&mut self, other: &GnArgs) -> &mut Self {
        for (key, value) in &other.entries {
            self.set(key.clone(), value.clone());
        }
        self
    }

    /// Render as one `key = value` line per argument, the form `gn gen --args=` takes.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{k} = {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Build a table from a TOML table (the `[gn-args.<platform>]` sections).
    pub fn from_toml_table(table: &toml::Table) -> Result<Self> {
        let mut args = GnArgs::new();
        for (key, value) in table {
            args.set(key.clone(), GnValue::from_toml(key, value)?);
        }
        Ok(args)
    }

    /// Parse a TOML document whose top-level keys are GN arguments.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(text)?;
        Self::from_toml_table(&table)
    }
}

impl<K: Into<String>, V: Into<GnValue>> FromIterator<(K, V)> for GnArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut args = GnArgs::new();
        for (k, v) in iter {
            args.set(k, v);
        }
        args
    }
}

impl Serialize for GnArgs {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl fmt::Display for GnArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Everything the assembler needs for one architecture slice.
#[derive(Debug, Clone)]
pub struct ArgRequest {
    pub configuration: Configuration,
    pub platform: PlatformId,
    pub arch: Arch,
    pub variant: Variant,
    pub text_backend: TextBackend,
    /// clang-cl location for Windows builds.
    pub clang_win: String,
    /// User overrides for this platform; applied last.
    pub overrides: GnArgs,
}

impl ArgRequest {
    /// A request with default variant, backend and no overrides.
    pub fn new(configuration: Configuration, platform: PlatformId, arch: Arch) -> Self {
        Self {
            configuration,
            platform,
            arch,
            variant: Variant::Gpu,
            text_backend: TextBackend::Icu,
            clang_win: DEFAULT_CLANG_WIN.to_string(),
            overrides: GnArgs::new(),
        }
    }
}

/// Assemble the GN arguments for one architecture slice.
///
/// Fails if `arch` is not on the platform's allow-list or is not a concrete
/// slice (`universal` must be expanded first).
pub fn assemble(req: &ArgRequest) -> Result<GnArgs> {
    let target = req.platform.target();
    target.validate_arch(req.arch)?;
    if req.arch == Arch::Universal {
        return Err(TargetError::InvalidArch {
            platform: req.platform.to_string(),
            arch: req.arch.to_string(),
            allowed: "a single slice (universal is expanded before assembly)".into(),
        });
    }

    let mut args = basic_args();
    match req.configuration {
        Configuration::Debug => args.overlay(&debug_args()),
        Configuration::Release => args.overlay(&release_args(req.text_backend)),
    };
    args.overlay(&platform_args(req.platform, req.variant));
    if req.variant == Variant::Cpu {
        args.overlay(&cpu_only_args());
    }
    args.overlay(&arch_args(req));
    args.overlay(&req.overrides);
    Ok(args)
}

/// Compiler selection shared by every build.
pub fn basic_args() -> GnArgs {
    [("cc", "clang"), ("cxx", "clang++")].into_iter().collect()
}

pub fn debug_args() -> GnArgs {
    [("is_debug", true), ("is_official_build", false)]
        .into_iter()
        .collect()
}

/// Shared release table: bundled third-party libraries, enabled modules
/// and the text backend toggle.
pub fn release_args(text_backend: TextBackend) -> GnArgs {
    let use_grapheme = text_backend == TextBackend::Libgrapheme;
    [
        ("skia_use_system_libjpeg_turbo", false),
        ("skia_use_system_libpng", false),
        ("skia_use_system_zlib", false),
        ("skia_use_system_expat", false),
        ("skia_use_system_icu", false),
        ("skia_use_system_harfbuzz", false),
        ("skia_use_libwebp_decode", false),
        ("skia_use_libwebp_encode", false),
        ("skia_use_xps", false),
        ("skia_use_dng_sdk", false),
        ("skia_use_expat", true),
        ("skia_use_gl", true),
        ("skia_use_icu", !use_grapheme),
        ("skia_use_libgrapheme", use_grapheme),
        ("skia_enable_graphite", true),
        ("skia_enable_svg", true),
        ("skia_enable_skottie", true),
        ("skia_enable_pdf", false),
        ("skia_enable_gpu", true),
        ("skia_enable_skparagraph", true),
        ("is_debug", false),
        ("is_official_build", true),
    ]
    .into_iter()
    .collect()
}

/// Disables every GPU backend; layered on top of the platform table.
pub fn cpu_only_args() -> GnArgs {
    [
        ("skia_enable_gpu", false),
        ("skia_enable_graphite", false),
        ("skia_use_gl", false),
        ("skia_use_vulkan", false),
    ]
    .into_iter()
    .collect()
}

const EXPAT_INCLUDE: &str = "-I../../../src/skia/third_party/externals/expat/lib";

/// Platform table for the given variant.
pub fn platform_args(platform: PlatformId, variant: Variant) -> GnArgs {
    let gpu = variant == Variant::Gpu;
    let min_os = platform.target().min_os_version.unwrap_or_default();
    let mut args = GnArgs::new();
    match platform {
        PlatformId::Mac => {
            args.set("skia_use_metal", gpu)
                .set("skia_use_dawn", gpu)
                .set("target_os", "mac")
                .set("extra_cflags", vec![format!("-mmacosx-version-min={min_os}")])
                .set("extra_cflags_c", &["-Wno-error"][..]);
        }
        PlatformId::Ios => {
            args.set("skia_use_metal", gpu)
                .set("target_os", "ios")
                .set("skia_ios_use_signing", false)
                .set(
                    "extra_cflags",
                    vec![
                        format!("-miphoneos-version-min={min_os}"),
                        EXPAT_INCLUDE.to_string(),
                    ],
                )
                .set("extra_cflags_c", &["-Wno-error"][..]);
        }
        PlatformId::Visionos => {
            // visionOS builds go through target_os = "ios" with an xros target triple.
            args.set("skia_use_metal", gpu)
                .set("target_os", "ios")
                .set("skia_ios_use_signing", false)
                .set(
                    "extra_cflags",
                    vec![
                        format!("--target=arm64-apple-xros{min_os}"),
                        EXPAT_INCLUDE.to_string(),
                    ],
                )
                .set("extra_cflags_c", &["-Wno-error"][..]);
            if gpu {
                args.set("dawn_target_platform", "visionos");
            }
        }
        PlatformId::Win => {
            args.set("skia_use_dawn", gpu)
                .set("skia_use_direct3d", gpu)
                .set("is_trivial_abi", false);
        }
        PlatformId::Linux => {
            args.set("skia_use_vulkan", gpu)
                .set("skia_use_dawn", gpu)
                .set("skia_use_x11", true)
                .set("skia_use_fontconfig", true)
                .set("skia_use_freetype", true)
                .set("skia_use_system_freetype2", false)
                .set("extra_cflags_c", &["-Wno-error"][..]);
        }
        PlatformId::Wasm => {
            args.overlay(&wasm_args(gpu));
        }
    }
    args
}

fn wasm_args(gpu: bool) -> GnArgs {
    let mut args = GnArgs::new();
    args.set("target_os", "wasm");
    let table: GnArgs = [
        ("is_component_build", false),
        ("is_trivial_abi", true),
        ("werror", true),
        ("skia_use_angle", false),
        ("skia_use_dng_sdk", false),
        ("skia_use_webgl", gpu),
        ("skia_use_webgpu", gpu),
        ("skia_use_expat", false),
        ("skia_use_fontconfig", false),
        ("skia_use_freetype", true),
        ("skia_use_libheif", false),
        ("skia_use_libjpeg_turbo_decode", true),
        ("skia_use_libjpeg_turbo_encode", false),
        ("skia_use_no_jpeg_encode", true),
        ("skia_use_libpng_decode", true),
        ("skia_use_libpng_encode", true),
        ("skia_use_no_png_encode", false),
        ("skia_use_libwebp_decode", true),
        ("skia_use_libwebp_encode", false),
        ("skia_use_no_webp_encode", true),
        ("skia_use_lua", false),
        ("skia_use_piex", false),
        ("skia_use_system_freetype2", false),
        ("skia_use_system_libwebp", false),
        ("skia_use_vulkan", false),
        ("skia_use_wuffs", true),
        ("skia_use_zlib", true),
        ("skia_enable_ganesh", gpu),
        ("skia_enable_graphite", false),
        ("skia_build_for_debugger", false),
        ("skia_enable_skottie", false),
        ("skia_use_client_icu", false),
        ("skia_use_icu4x", false),
        ("skia_use_harfbuzz", true),
        ("skia_use_system_harfbuzz", false),
        ("skia_enable_fontmgr_custom_directory", false),
        ("skia_enable_fontmgr_custom_embedded", true),
        ("skia_enable_fontmgr_custom_empty", true),
        ("skia_use_freetype_woff2", true),
        ("skia_enable_skshaper", true),
    ]
    .into_iter()
    .collect();
    args.overlay(&table);
    args
}

/// Architecture table: `target_cpu` plus per-slice extras.
pub fn arch_args(req: &ArgRequest) -> GnArgs {
    let mut args = GnArgs::new();
    match req.platform {
        PlatformId::Mac => {
            args.set("target_cpu", req.arch.as_str());
        }
        PlatformId::Ios | PlatformId::Visionos => {
            let cpu = if req.arch == Arch::Arm64 { "arm64" } else { "x64" };
            args.set("target_cpu", cpu);
            if req.platform == PlatformId::Ios && req.arch == Arch::X86_64 {
                args.set("ios_use_simulator", true);
            }
        }
        PlatformId::Win => {
            let runtime = if req.configuration.is_debug() { "/MTd" } else { "/MT" };
            let cpu = if req.arch == Arch::Win32 { "x86" } else { "x64" };
            args.set("extra_cflags", vec![runtime.to_string()])
                .set("target_cpu", cpu)
                .set("clang_win", req.clang_win.as_str());
        }
        PlatformId::Linux => {
            let cpu = if req.arch == Arch::Arm64 { "arm64" } else { "x64" };
            args.set("target_cpu", cpu);
        }
        PlatformId::Wasm => {
            args.set("target_cpu", "wasm");
        }
    }
    args
}
