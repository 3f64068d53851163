//! External process execution.
//!
//! Every tool the driver calls (git, python3, gn, ninja, lipo, libtool,
//! xcodebuild) goes through a [`ProcessRunner`], so the stages above it can
//! be exercised against a [`RecordingRunner`] without a toolchain.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{DriverError, Result};

/// One external command: program, arguments, working directory and
/// extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Whether `needle` appears among the arguments.
    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a == needle)
    }

    /// The value following `flag`, e.g. `-o <value>`.
    pub fn arg_after(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Runs external commands. Implementations block until the command exits.
pub trait ProcessRunner {
    /// Run `invocation`; a non-zero exit is an error.
    fn run(&mut self, invocation: &Invocation) -> Result<()>;
}

/// Spawns real processes. Tool output is inherited, so it reaches the
/// terminal unchanged.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<()> {
        debug!(cwd = ?invocation.cwd, "running {invocation}");
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }
        for (key, value) in &invocation.env {
            command.env(key, value);
        }

        let status = command.status().map_err(|source| DriverError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        if !status.success() {
            let status = match status.code() {
                Some(code) => format!("exit code {code}"),
                None => "terminated by signal".to_string(),
            };
            return Err(DriverError::ToolFailed {
                program: invocation.program.clone(),
                status,
                command: invocation.to_string(),
            });
        }
        Ok(())
    }
}

type Hook = Box<dyn FnMut(&Invocation) -> std::io::Result<()>>;

/// Records invocations instead of spawning them.
///
/// A hook can simulate a tool's side effects (writing the files ninja or
/// lipo would produce), and [`RecordingRunner::fail_on`] makes a given
/// program report failure.
#[derive(Default)]
pub struct RecordingRunner {
    pub invocations: Vec<Invocation>,
    fail_on: Option<String>,
    hook: Option<Hook>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hook(hook: impl FnMut(&Invocation) -> std::io::Result<()> + 'static) -> Self {
        Self {
            hook: Some(Box::new(hook)),
            ..Self::default()
        }
    }

    /// Make every invocation of `program` fail.
    pub fn fail_on(mut self, program: impl Into<String>) -> Self {
        self.fail_on = Some(program.into());
        self
    }

    /// Programs invoked so far, in order.
    pub fn programs(&self) -> Vec<&str> {
        self.invocations.iter().map(|i| i.program.as_str()).collect()
    }

    /// Invocations of `program` whose first argument is `subcommand`.
    pub fn count(&self, program: &str, subcommand: &str) -> usize {
        self.invocations
            .iter()
            .filter(|i| i.program == program && i.args.first().map(String::as_str) == Some(subcommand))
            .count()
    }
}

impl ProcessRunner for RecordingRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<()> {
        debug!("recording {invocation}");
        self.invocations.push(invocation.clone());
        if self.fail_on.as_deref() == Some(invocation.program.as_str()) {
            return Err(DriverError::ToolFailed {
                program: invocation.program.clone(),
                status: "exit code 1".to_string(),
                command: invocation.to_string(),
            });
        }
        if let Some(hook) = self.hook.as_mut() {
            hook(invocation).map_err(|source| DriverError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_display_quotes_spaces() {
        let inv = Invocation::new("gn")
            .arg("gen")
            .arg("out dir")
            .arg("--args=is_debug = true");
        assert_eq!(inv.to_string(), "gn gen \"out dir\" \"--args=is_debug = true\"");
    }

    #[test]
    fn arg_after_finds_flag_value() {
        let inv = Invocation::new("lipo").args(["-create", "a", "b", "-output", "c"]);
        assert_eq!(inv.arg_after("-output"), Some("c"));
        assert_eq!(inv.arg_after("-missing"), None);
        assert!(inv.has_arg("-create"));
    }

    #[test]
    fn recording_runner_records_and_fails() {
        let mut runner = RecordingRunner::new().fail_on("ninja");
        runner.run(&Invocation::new("gn").arg("gen")).unwrap();
        let err = runner.run(&Invocation::new("ninja").arg("-C")).unwrap_err();
        assert!(matches!(err, DriverError::ToolFailed { .. }));
        assert_eq!(runner.programs(), vec!["gn", "ninja"]);
        assert_eq!(runner.count("gn", "gen"), 1);
    }

    #[test]
    fn hook_runs_for_each_invocation() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("touched");
        let path = target.clone();
        let mut runner = RecordingRunner::with_hook(move |_| std::fs::write(&path, b"x"));
        runner.run(&Invocation::new("touch")).unwrap();
        assert!(target.exists());
    }

    #[test]
    fn system_runner_reports_spawn_failure() {
        let err = SystemRunner
            .run(&Invocation::new("skbuild-no-such-program-xyz"))
            .unwrap_err();
        assert!(matches!(err, DriverError::Spawn { .. }));
    }
}
