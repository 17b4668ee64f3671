//! Expected artifact digests.
//!
//! A definition states a digest as a bare hex string; the algorithm is never
//! named. It is picked from the length of the string alone:
//!
//! | hex chars | algorithm |
//! |---|---|
//! | 32 | MD5 |
//! | 40 | SHA-1 |
//! | 64 | SHA-256 |
//!
//! Any other non-zero length is a defect in the definition.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while interpreting an expected digest.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChecksumError {
    /// The digest length does not map to any supported algorithm.
    #[error("unsupported checksum length: {0} hex characters")]
    UnsupportedLength(usize),

    /// The digest contains characters outside `[0-9a-fA-F]`.
    #[error("invalid checksum '{0}': not a hex string")]
    InvalidHex(String),
}

/// Digest algorithms understood by the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    /// MD5 (32 hex chars)
    Md5,
    /// SHA-1 (40 hex chars)
    Sha1,
    /// SHA-256 (64 hex chars)
    Sha256,
}

impl ChecksumAlgorithm {
    /// All algorithms, in lookup-table order.
    pub const ALL: [Self; 3] = [Self::Md5, Self::Sha1, Self::Sha256];

    /// Select an algorithm from a hex digest length.
    ///
    /// # Errors
    ///
    /// Returns [`ChecksumError::UnsupportedLength`] for any length other than
    /// 32, 40 or 64.
    pub fn from_hex_len(len: usize) -> Result<Self, ChecksumError> {
        Self::ALL
            .into_iter()
            .find(|a| a.hex_len() == len)
            .ok_or(ChecksumError::UnsupportedLength(len))
    }

    /// Length of a hex digest produced by this algorithm.
    pub fn hex_len(self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha1 => 40,
            Self::Sha256 => 64,
        }
    }

    /// Lowercase name, as used in log output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }
}

impl std::fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated, lowercase hex digest together with its algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum {
    algorithm: ChecksumAlgorithm,
    hex: String,
}

impl Checksum {
    /// Parse an expected digest.
    ///
    /// An empty (or whitespace-only) string means "no checksum" and yields
    /// `Ok(None)`: verification is opt-in per artifact.
    ///
    /// # Errors
    ///
    /// Returns [`ChecksumError::UnsupportedLength`] when the length does not
    /// select an algorithm, or [`ChecksumError::InvalidHex`] when the string
    /// is not hex.
    pub fn parse(s: &str) -> Result<Option<Self>, ChecksumError> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(None);
        }

        let algorithm = ChecksumAlgorithm::from_hex_len(s.len())?;
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ChecksumError::InvalidHex(s.to_string()));
        }

        Ok(Some(Self {
            algorithm,
            hex: s.to_ascii_lowercase(),
        }))
    }

    /// The algorithm selected by the digest length.
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// The digest as lowercase hex.
    pub fn as_str(&self) -> &str {
        &self.hex
    }

    /// Compare against a computed hex digest, ignoring case.
    pub fn matches(&self, actual_hex: &str) -> bool {
        self.hex.eq_ignore_ascii_case(actual_hex)
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.hex)
    }
}

impl AsRef<str> for Checksum {
    fn as_ref(&self) -> &str {
        &self.hex
    }
}
