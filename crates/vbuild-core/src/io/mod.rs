//! IO modules - side effects (network, filesystem, subprocesses)

pub mod cache;
pub mod checksum;
pub mod download;
pub mod extract;
pub mod git;
pub mod tail;
