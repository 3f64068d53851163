//! `skbuild.toml` parsing and workspace discovery.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use skbuild_driver::{SourceSpec, Workspace};
use skbuild_targets::{GnArgs, PlatformId, TextBackend, Variant};
use tracing::debug;

pub const MANIFEST_FILE: &str = "skbuild.toml";

/// Top-level `skbuild.toml`. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SkbuildManifest {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub build: BuildSection,
    /// Per-platform GN overrides, keyed by platform name.
    #[serde(default)]
    pub gn_args: BTreeMap<String, toml::Table>,
}

/// Where the library and depot_tools come from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub depot_tools_url: Option<String>,
    /// Branch, tag or revision to check out.
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub shallow: Option<bool>,
}

/// Build defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildSection {
    /// Output root, relative to the directory holding `skbuild.toml`.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub variant: Option<Variant>,
    #[serde(default)]
    pub text_backend: Option<TextBackend>,
    #[serde(default)]
    pub clang_win: Option<String>,
}

impl SkbuildManifest {
    /// Search upward from `start_dir` for `skbuild.toml`, returning the
    /// parsed manifest and the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(MANIFEST_FILE);
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate)
                    .with_context(|| format!("reading {}", candidate.display()))?;
                let manifest = Self::parse(&content)
                    .with_context(|| format!("parsing {}", candidate.display()))?;
                return Ok(Some((manifest, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Parse a manifest from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Source URLs with built-in defaults filled in.
    pub fn source_spec(&self) -> SourceSpec {
        let defaults = SourceSpec::default();
        SourceSpec {
            url: self.source.url.clone().unwrap_or(defaults.url),
            depot_tools_url: self
                .source
                .depot_tools_url
                .clone()
                .unwrap_or(defaults.depot_tools_url),
        }
    }

    /// The `[gn-args.<platform>]` tables as typed overrides.
    pub fn gn_overrides(&self) -> Result<BTreeMap<PlatformId, GnArgs>> {
        self.gn_args
            .iter()
            .map(|(name, table)| -> Result<(PlatformId, GnArgs)> {
                let platform: PlatformId = name
                    .parse()
                    .with_context(|| format!("[gn-args.{name}]"))?;
                let args = GnArgs::from_toml_table(table)
                    .with_context(|| format!("[gn-args.{name}]"))?;
                Ok((platform, args))
            })
            .collect()
    }
}

/// The resolved workspace plus whatever configuration was found.
#[derive(Debug, Clone)]
pub struct Project {
    /// Root of the build tree.
    pub root: PathBuf,
    pub manifest: SkbuildManifest,
    /// Directory holding `skbuild.toml`, when one was found.
    pub manifest_dir: Option<PathBuf>,
}

impl Project {
    /// An explicit `--workspace` is both the search start and the output
    /// root. Otherwise the root is the manifest directory (joined with
    /// `build.output-dir` when set), or `cwd` when there is no manifest.
    pub fn discover(workspace: Option<&Path>, cwd: &Path) -> Result<Self> {
        let workspace = workspace.map(|ws| cwd.join(ws));
        let workspace = workspace.as_deref();
        let start = workspace.unwrap_or(cwd);
        match SkbuildManifest::find_and_load(start)? {
            Some((manifest, dir)) => {
                debug!("using {}", dir.join(MANIFEST_FILE).display());
                let root = match (workspace, &manifest.build.output_dir) {
                    (Some(ws), _) => ws.to_path_buf(),
                    (None, Some(out)) => dir.join(out),
                    (None, None) => dir.clone(),
                };
                Ok(Self {
                    root,
                    manifest,
                    manifest_dir: Some(dir),
                })
            }
            None => Ok(Self {
                root: start.to_path_buf(),
                manifest: SkbuildManifest::default(),
                manifest_dir: None,
            }),
        }
    }

    /// A project rooted at `root` with no configuration file.
    #[cfg(test)]
    pub fn bare(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            manifest: SkbuildManifest::default(),
            manifest_dir: None,
        }
    }

    pub fn workspace(&self) -> Workspace {
        Workspace::new(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skbuild_targets::GnValue;

    const FULL: &str = r#"
[source]
url = "https://github.com/google/skia.git"
branch = "chrome/m126"
shallow = true

[build]
output-dir = "build"
variant = "cpu"
text-backend = "libgrapheme"
clang-win = "D:\\LLVM"

[gn-args.mac]
skia_use_metal = false
extra_cflags = ["-DSK_TRIVIAL_ABI"]
"#;

    #[test]
    fn parse_full_manifest() {
        let m = SkbuildManifest::parse(FULL).unwrap();
        assert_eq!(m.source.branch.as_deref(), Some("chrome/m126"));
        assert_eq!(m.source.shallow, Some(true));
        assert_eq!(m.build.variant, Some(Variant::Cpu));
        assert_eq!(m.build.text_backend, Some(TextBackend::Libgrapheme));
        assert_eq!(m.build.clang_win.as_deref(), Some("D:\\LLVM"));

        let spec = m.source_spec();
        assert_eq!(spec.url, "https://github.com/google/skia.git");
        assert_eq!(spec.depot_tools_url, SourceSpec::default().depot_tools_url);

        let overrides = m.gn_overrides().unwrap();
        let mac = &overrides[&PlatformId::Mac];
        assert_eq!(mac.get("skia_use_metal"), Some(&GnValue::Bool(false)));
        assert_eq!(mac.len(), 2);
    }

    #[test]
    fn empty_manifest_is_all_defaults() {
        let m = SkbuildManifest::parse("").unwrap();
        assert_eq!(m, SkbuildManifest::default());
        assert!(m.gn_overrides().unwrap().is_empty());
    }

    #[test]
    fn unknown_platform_table_rejected() {
        let m = SkbuildManifest::parse("[gn-args.amiga]\nx = 1\n").unwrap();
        let err = m.gn_overrides().unwrap_err();
        assert!(format!("{err:#}").contains("amiga"));
    }

    #[test]
    fn bad_variant_rejected() {
        assert!(SkbuildManifest::parse("[build]\nvariant = \"vulkan\"\n").is_err());
    }

    #[test]
    fn discover_searches_upward_and_applies_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            "[build]\noutput-dir = \"out\"\n",
        )
        .unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        let project = Project::discover(None, &nested).unwrap();
        assert_eq!(project.manifest_dir.as_deref(), Some(dir.path()));
        assert_eq!(project.root, dir.path().join("out"));
    }

    #[test]
    fn explicit_workspace_is_the_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "[build]\noutput-dir = \"out\"\n").unwrap();
        let project = Project::discover(Some(dir.path()), Path::new("/elsewhere")).unwrap();
        assert_eq!(project.root, dir.path());
    }

    #[test]
    fn relative_workspace_resolves_against_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::discover(Some(Path::new("w")), dir.path()).unwrap();
        assert_eq!(project.root, dir.path().join("w"));
        let ws = project.workspace();
        assert_eq!(ws.source_dir(), dir.path().join("w").join("src").join("skia"));
    }

    #[test]
    fn no_manifest_uses_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::discover(None, dir.path()).unwrap();
        assert!(project.manifest_dir.is_none());
        assert_eq!(project.root, dir.path());
    }
}
