//! TOML definition parsing
//!
//! A definition is data, never code: an ordered list of directives, each
//! either a notice or an install guarded by a platform predicate.
//!
//! ```toml
//! executable = "go"
//!
//! [[directive]]
//! kind = "install"
//! name = "go1.21.0.linux-amd64"
//! when = { os = "linux", arch = "amd64" }
//! artifact = { type = "tarball", url = "https://go.dev/dl/go1.21.0.linux-amd64.tar.gz", checksum = "..." }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vbuild_schema::{Arch, Checksum, ChecksumError, Os};

use crate::paths::filename_from_url;

/// Errors that can occur when loading or parsing a definition.
#[derive(Error, Debug)]
pub enum DefinitionError {
    /// An I/O error occurred while reading a definition file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML content could not be deserialized into a definition.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The definition parsed but is not usable.
    #[error("{0}")]
    Invalid(String),
}

/// A loaded definition body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Definition {
    /// Primary executable under `<prefix>/bin`, overriding the configured default.
    #[serde(default)]
    pub executable: Option<String>,
    /// Arguments used to check the executable runs (default `["version"]`).
    #[serde(default)]
    pub verify_args: Option<Vec<String>>,
    /// Directives in declaration order.
    #[serde(default, rename = "directive")]
    pub directives: Vec<Directive>,
}

/// One entry of a definition body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", deny_unknown_fields)]
pub enum Directive {
    /// Print a message; has no effect on installation.
    Notice {
        /// Text to log.
        message: String,
    },
    /// Install an artifact when the predicate holds.
    Install(InstallDirective),
}

/// An artifact guarded by a platform predicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstallDirective {
    /// Human-readable package name; also names the extraction directory.
    #[serde(default)]
    pub name: Option<String>,
    /// Platform this artifact is built for.
    pub when: PlatformPredicate,
    /// What to fetch.
    pub artifact: Artifact,
}

impl InstallDirective {
    /// Name shown in progress output.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.artifact.filename().to_string())
    }
}

/// An (OS, architecture, optional OS version range) tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformPredicate {
    /// Required operating system.
    pub os: Os,
    /// Required CPU architecture.
    pub arch: Arch,
    /// Optional OS version range.
    #[serde(default)]
    pub os_version: Option<OsVersionRange>,
}

/// Half-open OS version range: `min` inclusive, `max` exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OsVersionRange {
    /// Lowest accepted version.
    #[serde(default)]
    pub min: Option<String>,
    /// First version no longer accepted.
    #[serde(default)]
    pub max: Option<String>,
}

/// One fetchable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", deny_unknown_fields)]
pub enum Artifact {
    /// A tar archive, optionally gzip/bzip2/xz/zstd compressed.
    Tarball {
        /// Download URL, optionally with a `#<checksum>` fragment.
        url: String,
        /// Expected hex digest.
        #[serde(default)]
        checksum: Option<String>,
    },
    /// A zip archive.
    Zip {
        /// Download URL, optionally with a `#<checksum>` fragment.
        url: String,
        /// Expected hex digest.
        #[serde(default)]
        checksum: Option<String>,
    },
    /// A git repository checkout.
    SourceControl {
        /// Clone URL.
        repository: String,
        /// Branch or tag to check out.
        #[serde(default)]
        reference: Option<String>,
    },
}

impl Artifact {
    /// Where to fetch from, with any checksum fragment removed.
    pub fn url(&self) -> &str {
        match self {
            Self::Tarball { url, .. } | Self::Zip { url, .. } => {
                url.split_once('#').map_or(url.as_str(), |(u, _)| u)
            }
            Self::SourceControl { repository, .. } => repository,
        }
    }

    /// The expected digest as written, from the field or the URL fragment.
    pub fn checksum_str(&self) -> Option<&str> {
        match self {
            Self::Tarball { url, checksum } | Self::Zip { url, checksum } => checksum
                .as_deref()
                .or_else(|| url.split_once('#').map(|(_, c)| c))
                .filter(|c| !c.trim().is_empty()),
            Self::SourceControl { .. } => None,
        }
    }

    /// The expected digest, validated.
    ///
    /// # Errors
    ///
    /// Returns a [`ChecksumError`] when the digest length selects no
    /// algorithm or the digest is not hex.
    pub fn checksum(&self) -> Result<Option<Checksum>, ChecksumError> {
        match self.checksum_str() {
            Some(c) => Checksum::parse(c),
            None => Ok(None),
        }
    }

    /// Canonical artifact filename, used for the workspace copy and the cache key.
    pub fn filename(&self) -> &str {
        match self {
            Self::Tarball { .. } | Self::Zip { .. } => filename_from_url(self.url()),
            Self::SourceControl { repository, .. } => {
                let base = repository.trim_end_matches('/');
                let base = base.rsplit(['/', ':']).next().unwrap_or(base);
                base.strip_suffix(".git").unwrap_or(base)
            }
        }
    }

    /// Short kind label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Tarball { .. } => "tarball",
            Self::Zip { .. } => "zip",
            Self::SourceControl { .. } => "source-control",
        }
    }
}

impl Definition {
    /// Parse a definition from a TOML file on disk.
    ///
    /// # Errors
    ///
    /// Returns `DefinitionError::Io` if the file cannot be read, or a parse
    /// or validation error for bad content.
    pub fn from_file(path: &Path) -> Result<Self, DefinitionError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a definition from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `DefinitionError::Parse` if the TOML content is invalid, or
    /// `DefinitionError::Invalid` if an artifact has an empty location.
    pub fn parse(content: &str) -> Result<Self, DefinitionError> {
        let def: Self = toml::from_str(content)?;

        for directive in &def.directives {
            if let Directive::Install(install) = directive {
                if install.artifact.url().trim().is_empty() {
                    return Err(DefinitionError::Invalid(format!(
                        "install directive '{}' has an empty {} location",
                        install.display_name(),
                        install.artifact.kind()
                    )));
                }
            }
        }

        Ok(def)
    }

    /// Install directives only, in declaration order.
    pub fn installs(&self) -> impl Iterator<Item = &InstallDirective> {
        self.directives.iter().filter_map(|d| match d {
            Directive::Install(i) => Some(i),
            Directive::Notice { .. } => None,
        })
    }
}
