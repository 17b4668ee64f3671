//! Failure taxonomy for an install invocation.

use std::path::PathBuf;

use thiserror::Error;
use vbuild_schema::{ChecksumError, ChecksumAlgorithm};

use crate::definition::DefinitionError;
use crate::io::download::FetchError;
use crate::io::extract::ExtractError;

/// Every way an invocation can end other than success.
///
/// Each variant aborts the pipeline at the point it is raised; nothing is
/// retried except the cache-to-network fallback, which never surfaces here.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("usage: {0}")]
    Usage(String),

    #[error("definition not found: {0}")]
    DefinitionNotFound(String),

    #[error("invalid definition: {0}")]
    InvalidDefinition(#[from] DefinitionError),

    #[error("no installable version found for {os} {arch}")]
    NoMatchingPlatform { os: String, arch: String },

    #[error("fetch failed: {0}")]
    FetchFailed(#[from] FetchError),

    #[error("checksum mismatch for {file} ({algorithm}): expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        algorithm: ChecksumAlgorithm,
        expected: String,
        actual: String,
    },

    #[error("unsupported checksum length: {0} hex characters")]
    UnsupportedChecksumLength(usize),

    #[error("extraction failed: {0}")]
    ExtractionFailed(#[from] ExtractError),

    #[error("installed executable is not usable: {}", .0.display())]
    InvalidExecutable(PathBuf),

    #[error("environment unsuitable: {0}")]
    EnvironmentUnsuitable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::DefinitionNotFound(_) => 2,
            _ => 1,
        }
    }

    /// Create an IO error with context for better debugging.
    pub fn io_context(ctx: &str, err: std::io::Error) -> Self {
        Self::Io(std::io::Error::new(err.kind(), format!("{ctx}: {err}")))
    }
}

impl From<ChecksumError> for BuildError {
    fn from(err: ChecksumError) -> Self {
        match err {
            ChecksumError::UnsupportedLength(len) => Self::UnsupportedChecksumLength(len),
            ChecksumError::InvalidHex(hex) => {
                Self::InvalidDefinition(DefinitionError::Invalid(format!("bad checksum '{hex}'")))
            }
        }
    }
}
