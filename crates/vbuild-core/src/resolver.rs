//! Maps a user-supplied version spec to a definition file.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::catalog::VersionCatalog;
use crate::error::BuildError;

/// A located definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Identifier (or path, for custom definitions) the version spec resolved to.
    pub identifier: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DefinitionResolver {
    catalog: VersionCatalog,
    major: String,
}

impl DefinitionResolver {
    pub fn new(catalog: VersionCatalog, major: impl Into<String>) -> Self {
        Self {
            catalog,
            major: major.into(),
        }
    }

    pub fn catalog(&self) -> &VersionCatalog {
        &self.catalog
    }

    /// Resolve `spec` to a definition file.
    ///
    /// 1. Bare `21` / `21rc1` gain the major prefix.
    /// 2. An existing file path is used directly.
    /// 3. `latest` picks the newest release.
    /// 4. `<major>.<minor>rc<N>` picks the newest `<major>.<minor>rc` candidate.
    /// 5. Otherwise an exact filename is searched for in each directory.
    /// 6. `<major>.<minor>` with no exact file picks the newest patch release.
    ///
    /// # Errors
    ///
    /// `BuildError::Usage` for an empty spec, `BuildError::DefinitionNotFound`
    /// when nothing matches.
    pub fn resolve(&self, spec: &str) -> Result<Resolved, BuildError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(BuildError::Usage("a version is required".into()));
        }

        let identifier = if is_bare(spec) {
            let expanded = format!("{}.{spec}", self.major);
            debug!("expanded {spec} to {expanded}");
            expanded
        } else {
            spec.to_string()
        };

        let as_path = Path::new(&identifier);
        if as_path.is_file() {
            return Ok(Resolved {
                path: as_path.to_path_buf(),
                identifier,
            });
        }

        if identifier == "latest" {
            let latest = self
                .catalog
                .latest_release()
                .ok_or_else(|| BuildError::DefinitionNotFound(identifier.clone()))?;
            info!("latest resolved to {latest}");
            return self.lookup(&latest);
        }

        if let Some(prefix) = minor_rc_prefix(&identifier) {
            let candidate = self
                .catalog
                .latest_matching(prefix)
                .ok_or_else(|| BuildError::DefinitionNotFound(identifier.clone()))?;
            if candidate != identifier {
                info!("using {candidate} for {identifier}");
            }
            return self.lookup(&candidate);
        }

        if let Ok(found) = self.lookup(&identifier) {
            return Ok(found);
        }

        if is_major_minor(&identifier) {
            if let Some(candidate) = self.catalog.latest_release_matching(&identifier) {
                info!("using {candidate} for {identifier}");
                return self.lookup(&candidate);
            }
        }

        Err(BuildError::DefinitionNotFound(identifier))
    }

    fn lookup(&self, identifier: &str) -> Result<Resolved, BuildError> {
        self.catalog
            .find(identifier)
            .map(|path| Resolved {
                identifier: identifier.to_string(),
                path,
            })
            .ok_or_else(|| BuildError::DefinitionNotFound(identifier.to_string()))
    }
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// `21`, `21rc`, `21rc1`
fn is_bare(s: &str) -> bool {
    match s.split_once("rc") {
        Some((num, n)) => all_digits(num) && n.bytes().all(|b| b.is_ascii_digit()),
        None => all_digits(s),
    }
}

/// `1.21`
fn is_major_minor(s: &str) -> bool {
    s.split_once('.')
        .is_some_and(|(major, minor)| all_digits(major) && all_digits(minor))
}

/// For `1.21rc2` returns `1.21rc`.
fn minor_rc_prefix(s: &str) -> Option<&str> {
    let (major, rest) = s.split_once('.')?;
    if !all_digits(major) || !rest.contains("rc") || !is_bare(rest) {
        return None;
    }
    let end = s.find("rc")? + 2;
    Some(&s[..end])
}
