//! Fetching, building, assembling and packaging Skia for skbuild.
//!
//! The stages run in order: [`fetch`] -> [`build`] (per architecture) ->
//! [`universal`] (Apple platforms) -> [`package`]. [`pipeline::run`] drives
//! them all. External tools are reached only through a
//! [`runner::ProcessRunner`], and every path comes from a
//! [`layout::Workspace`].

pub mod build;
pub mod error;
pub mod fetch;
pub mod layout;
pub mod package;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod universal;

pub use error::{DriverError, Result};
pub use fetch::{FetchOutcome, SourceSpec};
pub use layout::Workspace;
pub use pipeline::{run, BuildTarget, PipelineOptions};
pub use report::BuildReport;
pub use runner::{Invocation, ProcessRunner, RecordingRunner, SystemRunner};
