//! Content digest verification.
//!
//! The algorithm is chosen by the length of the expected digest (see
//! [`vbuild_schema::hash`]). Each algorithm is a backend that can be marked
//! unavailable; an unavailable backend skips verification instead of failing.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use vbuild_schema::{Checksum, ChecksumAlgorithm, ChecksumError};

/// Outcome of a verification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// The file matches the expected digest.
    Passed,
    /// No digest was expected, or the algorithm is unavailable.
    Skipped,
    /// The file's digest differs.
    Failed {
        algorithm: ChecksumAlgorithm,
        actual: String,
    },
}

impl Verification {
    /// Whether the pipeline may proceed with the file.
    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Computes and compares MD5/SHA-1/SHA-256 digests.
#[derive(Debug, Clone)]
pub struct Verifier {
    unavailable: HashSet<ChecksumAlgorithm>,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Verifier {
    /// A verifier with every algorithm available.
    pub fn new() -> Self {
        Self {
            unavailable: HashSet::new(),
        }
    }

    /// Mark an algorithm as unavailable on this host.
    #[must_use]
    pub fn without(mut self, algorithm: ChecksumAlgorithm) -> Self {
        self.unavailable.insert(algorithm);
        self
    }

    pub fn is_available(&self, algorithm: ChecksumAlgorithm) -> bool {
        !self.unavailable.contains(&algorithm)
    }

    /// Mirrors are addressed by SHA-256; without it they cannot be used.
    pub fn supports_mirrors(&self) -> bool {
        self.is_available(ChecksumAlgorithm::Sha256)
    }

    /// Verify `path` against `expected` (hex, any case).
    ///
    /// An empty `expected` always passes as [`Verification::Skipped`].
    ///
    /// # Errors
    ///
    /// Returns `ChecksumError` when `expected` has an unsupported length or
    /// is not hex. I/O failures while reading the file are reported as a
    /// failed verification rather than an error.
    pub fn verify(&self, path: &Path, expected: &str) -> Result<Verification, ChecksumError> {
        let Some(checksum) = Checksum::parse(expected)? else {
            return Ok(Verification::Skipped);
        };
        Ok(self.verify_checksum(path, &checksum))
    }

    /// Verify against an already-parsed digest.
    pub fn verify_checksum(&self, path: &Path, checksum: &Checksum) -> Verification {
        let algorithm = checksum.algorithm();
        if !self.is_available(algorithm) {
            warn!("{algorithm} unavailable, skipping verification of {}", path.display());
            return Verification::Skipped;
        }

        match digest_file(path, algorithm) {
            Ok(actual) if checksum.matches(&actual) => {
                debug!("{algorithm} ok for {}", path.display());
                Verification::Passed
            }
            Ok(actual) => Verification::Failed { algorithm, actual },
            Err(e) => {
                debug!("could not hash {}: {e}", path.display());
                Verification::Failed {
                    algorithm,
                    actual: String::new(),
                }
            }
        }
    }
}

/// Hex digest of a file's contents.
pub fn digest_file(path: &Path, algorithm: ChecksumAlgorithm) -> io::Result<String> {
    let reader = BufReader::new(File::open(path)?);
    match algorithm {
        ChecksumAlgorithm::Md5 => hash_reader::<Md5>(reader),
        ChecksumAlgorithm::Sha1 => hash_reader::<Sha1>(reader),
        ChecksumAlgorithm::Sha256 => hash_reader::<Sha256>(reader),
    }
}

fn hash_reader<D: Digest>(mut reader: impl Read) -> io::Result<String> {
    let mut hasher = D::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
