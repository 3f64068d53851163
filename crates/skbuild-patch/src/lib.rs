//! Source patching for skbuild.
//!
//! Patch sets are declared in TOML and applied to a checkout with
//! [`PatchSet::apply`]. Every file carries a signature so that re-applying
//! a set is a no-op, and a set either patches every file or none.

pub mod builtin;
pub mod error;
pub mod patch;

pub use builtin::builtin;
pub use error::{PatchError, Result};
pub use patch::{FileOutcome, FilePatch, PatchSet, PatchState, Rewrite};
