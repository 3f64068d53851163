//! Source fetcher: depot_tools and the pinned library checkout.
//!
//! The checkout carries a revision stamp. When it already names the
//! requested revision the fetcher spawns nothing, which keeps repeated
//! runs free of network I/O.

use std::fmt;

use tracing::{debug, info};

use crate::error::{DriverError, Result};
use crate::layout::Workspace;
use crate::runner::{Invocation, ProcessRunner};

pub const DEFAULT_SOURCE_URL: &str = "https://github.com/google/skia.git";
pub const DEFAULT_DEPOT_TOOLS_URL: &str =
    "https://chromium.googlesource.com/chromium/tools/depot_tools.git";

/// Where the sources come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub url: String,
    pub depot_tools_url: String,
}

impl Default for SourceSpec {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            depot_tools_url: DEFAULT_DEPOT_TOOLS_URL.to_string(),
        }
    }
}

/// What the fetcher did to the library checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The stamp matched; nothing ran.
    UpToDate,
    Cloned,
    Updated,
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FetchOutcome::UpToDate => "up to date",
            FetchOutcome::Cloned => "cloned",
            FetchOutcome::Updated => "updated",
        })
    }
}

/// Revision the checkout was last synced to, if any.
pub fn read_stamp(ws: &Workspace) -> Option<String> {
    std::fs::read_to_string(ws.stamp_path())
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Clone depot_tools unless it is already present. Returns whether a clone ran.
pub fn ensure_depot_tools(
    ws: &Workspace,
    runner: &mut dyn ProcessRunner,
    url: &str,
) -> Result<bool> {
    let dir = ws.depot_tools_dir();
    if dir.exists() {
        debug!("depot_tools present at {}", dir.display());
        return Ok(false);
    }
    info!("cloning depot_tools");
    runner.run(&Invocation::new("git").arg("clone").arg(url).path_arg(&dir))?;
    Ok(true)
}

/// Make sure the library checkout exists at `revision` and its third-party
/// dependencies are synced.
pub fn fetch(
    ws: &Workspace,
    runner: &mut dyn ProcessRunner,
    source: &SourceSpec,
    revision: &str,
    shallow: bool,
) -> Result<FetchOutcome> {
    ensure_depot_tools(ws, runner, &source.depot_tools_url)?;

    let src = ws.source_dir();
    if src.exists() && read_stamp(ws).as_deref() == Some(revision) {
        info!("source already at {revision}");
        return Ok(FetchOutcome::UpToDate);
    }

    let outcome = if src.exists() {
        info!("updating source to {revision}");
        let mut fetch = Invocation::new("git").arg("fetch");
        if shallow {
            fetch = fetch.args(["--depth", "1"]);
        }
        runner.run(&fetch.args(["origin", revision]).current_dir(&src))?;
        runner.run(
            &Invocation::new("git")
                .args(["checkout", revision])
                .current_dir(&src),
        )?;
        runner.run(
            &Invocation::new("git")
                .args(["reset", "--hard"])
                .arg(format!("origin/{revision}"))
                .current_dir(&src),
        )?;
        FetchOutcome::Updated
    } else {
        info!("cloning source at {revision}");
        if let Some(parent) = src.parent() {
            std::fs::create_dir_all(parent).map_err(DriverError::io(parent))?;
        }
        let mut clone = Invocation::new("git").arg("clone");
        if shallow {
            clone = clone.args(["--depth", "1"]);
        }
        runner.run(
            &clone
                .args(["--branch", revision])
                .arg(source.url.as_str())
                .path_arg(&src),
        )?;
        FetchOutcome::Cloned
    };

    sync_deps(ws, runner)?;

    let stamp = ws.stamp_path();
    std::fs::write(&stamp, format!("{revision}\n")).map_err(DriverError::io(&stamp))?;
    Ok(outcome)
}

/// Run `tools/git-sync-deps` inside the checkout.
pub fn sync_deps(ws: &Workspace, runner: &mut dyn ProcessRunner) -> Result<()> {
    info!("syncing third-party dependencies");
    runner.run(
        &Invocation::new("python3")
            .arg("tools/git-sync-deps")
            .current_dir(ws.source_dir())
            .env("PATH", ws.tool_path()?),
    )
}
