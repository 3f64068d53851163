//! CLI command implementations.

pub mod args;
pub mod build;
pub mod ci;
pub mod clean;
pub mod doctor;
pub mod package;
pub mod patch;
pub mod target;
