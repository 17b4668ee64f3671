//! Shared types for vbuild.
//!
//! Everything in this crate is pure data: no filesystem, network, or
//! process access. The pipeline in `vbuild-core` builds on these.

pub mod arch;
pub mod hash;
pub mod version;

// Re-exports
pub use arch::*;
pub use hash::*;
pub use version::{VersionKey, compare_versions, sort_versions};
