//! Platform tables, build configuration and GN argument assembly for skbuild.
//!
//! Everything in this crate is pure data and validation. Nothing here
//! touches the filesystem or spawns a process, so a bad platform or
//! architecture is always rejected before a build starts.

pub mod config;
pub mod error;
pub mod gn_args;
pub mod platform;

pub use config::{parse_arch_list, BuildConfig, Configuration, TextBackend, Variant};
pub use error::{Result, TargetError};
pub use gn_args::{assemble, ArgRequest, GnArgs, GnValue};
pub use platform::{builtin_targets, Arch, LibStyle, PlatformId, PlatformTarget};
