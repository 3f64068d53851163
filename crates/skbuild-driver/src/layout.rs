//! On-disk workspace layout.
//!
//! ```text
//! <root>/src/skia                      library checkout
//! <root>/tmp/depot_tools               dependency tool checkout
//! <root>/tmp/skia/<plat>_<Config>_<arch>_<variant>   per-slice build dirs
//! <root>/include                       packaged headers
//! <root>/<plat>-<variant>/lib/<Config>[/<arch>]      libraries
//! <root>/xcframework/Skia.xcframework
//! <root>/skia-<plat>-<variant>.zip     archives
//! ```

use std::path::{Path, PathBuf};

use skbuild_targets::{Arch, Configuration, PlatformId, Variant};
use tracing::info;

use crate::error::{DriverError, Result};

/// File in the checkout recording which revision it was synced to.
pub const REVISION_STAMP: &str = ".skbuild-revision";

/// Root of every path the driver reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// A relative `root` is resolved against the current directory, since
    /// tools run with the checkout as their working directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = if root.has_root() {
            root
        } else {
            std::path::absolute(&root).unwrap_or(root)
        };
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source_dir(&self) -> PathBuf {
        self.root.join("src").join("skia")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    pub fn depot_tools_dir(&self) -> PathBuf {
        self.tmp_dir().join("depot_tools")
    }

    /// The gn binary the checkout fetches for itself.
    pub fn gn_path(&self) -> PathBuf {
        let name = if cfg!(windows) { "gn.exe" } else { "gn" };
        self.source_dir().join("bin").join(name)
    }

    /// Parent of every per-slice build directory.
    pub fn intermediate_dir(&self) -> PathBuf {
        self.tmp_dir().join("skia")
    }

    pub fn out_dir(
        &self,
        platform: PlatformId,
        configuration: Configuration,
        arch: Arch,
        variant: Variant,
    ) -> PathBuf {
        self.intermediate_dir()
            .join(format!("{platform}_{configuration}_{arch}_{variant}"))
    }

    pub fn include_dir(&self) -> PathBuf {
        self.root.join("include")
    }

    pub fn platform_dir(&self, platform: PlatformId, variant: Variant) -> PathBuf {
        self.root.join(format!("{platform}-{variant}"))
    }

    pub fn lib_root(&self, platform: PlatformId, variant: Variant) -> PathBuf {
        self.platform_dir(platform, variant).join("lib")
    }

    /// Directory holding the libraries of one slice. `None` names the
    /// configuration directory itself (mac universal output); wasm never
    /// has an architecture subdirectory.
    pub fn lib_dir(
        &self,
        platform: PlatformId,
        variant: Variant,
        configuration: Configuration,
        arch: Option<Arch>,
    ) -> PathBuf {
        let dir = self
            .lib_root(platform, variant)
            .join(configuration.as_str());
        match arch {
            Some(arch) if platform != PlatformId::Wasm => dir.join(arch.as_str()),
            _ => dir,
        }
    }

    pub fn gn_summary_path(&self, platform: PlatformId, variant: Variant) -> PathBuf {
        if platform == PlatformId::Wasm {
            self.platform_dir(platform, variant).join("gn_args.txt")
        } else {
            self.lib_root(platform, variant).join("gn_args.txt")
        }
    }

    pub fn xcframework_path(&self) -> PathBuf {
        self.root.join("xcframework").join("Skia.xcframework")
    }

    pub fn archive_path(&self, platform: PlatformId, variant: Variant) -> PathBuf {
        self.root.join(format!("skia-{platform}-{variant}.zip"))
    }

    pub fn all_platforms_archive_path(&self, variant: Variant) -> PathBuf {
        self.root.join(format!("skia-all-platforms-{variant}.zip"))
    }

    pub fn stamp_path(&self) -> PathBuf {
        self.source_dir().join(REVISION_STAMP)
    }

    /// `PATH` with depot_tools prepended, as gn and git-sync-deps expect.
    pub fn tool_path(&self) -> Result<String> {
        let depot = self.depot_tools_dir();
        let existing = std::env::var_os("PATH").unwrap_or_default();
        let entries = std::iter::once(depot.clone()).chain(std::env::split_paths(&existing));
        let joined = std::env::join_paths(entries)
            .map_err(|source| DriverError::PathEntry { path: depot, source })?;
        Ok(joined.to_string_lossy().into_owned())
    }

    /// Remove the intermediate build directories, and with `sources` the
    /// library and depot_tools checkouts too. Returns what was removed.
    pub fn clean(&self, sources: bool) -> Result<Vec<PathBuf>> {
        let mut targets = vec![self.intermediate_dir()];
        if sources {
            targets.push(self.source_dir());
            targets.push(self.depot_tools_dir());
        }

        let mut removed = Vec::new();
        for dir in targets {
            if remove_dir_if_present(&dir)? {
                info!("removed {}", dir.display());
                removed.push(dir);
            }
        }
        Ok(removed)
    }
}

/// Remove a directory tree; absence is not an error.
pub(crate) fn remove_dir_if_present(dir: &Path) -> Result<bool> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(DriverError::io(dir)(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_paths() {
        let ws = Workspace::new("/w");
        assert_eq!(
            ws.out_dir(
                PlatformId::Mac,
                Configuration::Release,
                Arch::Arm64,
                Variant::Gpu
            ),
            PathBuf::from("/w/tmp/skia/mac_Release_arm64_gpu")
        );
        assert_eq!(
            ws.lib_dir(
                PlatformId::Ios,
                Variant::Cpu,
                Configuration::Debug,
                Some(Arch::X86_64)
            ),
            PathBuf::from("/w/ios-cpu/lib/Debug/x86_64")
        );
        assert_eq!(
            ws.lib_dir(PlatformId::Mac, Variant::Gpu, Configuration::Release, None),
            PathBuf::from("/w/mac-gpu/lib/Release")
        );
    }

    #[test]
    fn wasm_has_no_arch_dir() {
        let ws = Workspace::new("/w");
        assert_eq!(
            ws.lib_dir(
                PlatformId::Wasm,
                Variant::Gpu,
                Configuration::Release,
                Some(Arch::Wasm32)
            ),
            PathBuf::from("/w/wasm-gpu/lib/Release")
        );
        assert_eq!(
            ws.gn_summary_path(PlatformId::Wasm, Variant::Gpu),
            PathBuf::from("/w/wasm-gpu/gn_args.txt")
        );
        assert_eq!(
            ws.gn_summary_path(PlatformId::Linux, Variant::Gpu),
            PathBuf::from("/w/linux-gpu/lib/gn_args.txt")
        );
    }

    #[test]
    fn archive_names() {
        let ws = Workspace::new("/w");
        assert_eq!(
            ws.archive_path(PlatformId::Win, Variant::Cpu),
            PathBuf::from("/w/skia-win-cpu.zip")
        );
        assert_eq!(
            ws.all_platforms_archive_path(Variant::Gpu),
            PathBuf::from("/w/skia-all-platforms-gpu.zip")
        );
    }

    #[test]
    fn tool_path_starts_with_depot_tools() {
        let ws = Workspace::new("/w");
        let path = ws.tool_path().unwrap();
        let first = std::env::split_paths(&path).next().unwrap();
        assert_eq!(first, ws.depot_tools_dir());
    }

    #[test]
    fn relative_root_is_made_absolute() {
        let ws = Workspace::new("w");
        assert!(ws.root().is_absolute());
        assert_eq!(ws.root(), std::env::current_dir().unwrap().join("w"));
        assert!(ws.source_dir().is_absolute());
        assert!(ws.depot_tools_dir().is_absolute());
    }

    #[test]
    fn gn_lives_in_the_checkout() {
        let ws = Workspace::new("/w");
        assert!(ws.gn_path().starts_with(ws.source_dir().join("bin")));
        assert!(ws.gn_path().is_absolute() || cfg!(windows));
    }

    #[test]
    fn clean_removes_only_intermediate_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        std::fs::create_dir_all(ws.intermediate_dir().join("mac_Release_arm64_gpu")).unwrap();
        std::fs::create_dir_all(ws.source_dir()).unwrap();

        let removed = ws.clean(false).unwrap();
        assert_eq!(removed, vec![ws.intermediate_dir()]);
        assert!(ws.source_dir().exists());

        let removed = ws.clean(true).unwrap();
        assert_eq!(removed, vec![ws.source_dir()]);
        assert!(!ws.source_dir().exists());
    }
}
