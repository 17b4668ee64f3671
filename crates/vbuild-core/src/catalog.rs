//! Enumerates definition identifiers across the search path.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use vbuild_schema::{VersionKey, sort_versions};

/// The set of definitions visible through an ordered list of directories.
#[derive(Debug, Clone)]
pub struct VersionCatalog {
    dirs: Vec<PathBuf>,
}

impl VersionCatalog {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// Search directories, in priority order.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// All identifiers, deduplicated and semantically ordered (lowest first).
    ///
    /// Directories are scanned non-recursively; missing or unreadable ones
    /// are skipped silently. Hidden files are ignored.
    pub fn list(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();

        for dir in &self.dirs {
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.flatten() {
                if !entry.path().is_file() {
                    continue;
                }
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    continue;
                };
                if name.starts_with('.') {
                    continue;
                }
                if seen.insert(name.clone()) {
                    ids.push(name);
                }
            }
        }

        sort_versions(&mut ids);
        ids
    }

    /// Highest identifier that matches `prefix` on a segment boundary.
    ///
    /// `1.21rc` matches `1.21rc1`; `1.2` matches `1.2` and `1.2.1` but not `1.21.0`.
    pub fn latest_matching(&self, prefix: &str) -> Option<String> {
        self.list()
            .into_iter()
            .filter(|id| matches_prefix(id, prefix))
            .next_back()
    }

    /// Like [`latest_matching`](Self::latest_matching), skipping pre-releases.
    ///
    /// `1.22` matches `1.22.1` but not `1.22rc2`.
    pub fn latest_release_matching(&self, prefix: &str) -> Option<String> {
        self.list()
            .into_iter()
            .filter(|id| matches_prefix(id, prefix) && !VersionKey::new(id).is_prerelease())
            .next_back()
    }

    /// Highest identifier without a pre-release marker.
    pub fn latest_release(&self) -> Option<String> {
        self.list()
            .into_iter()
            .filter(|id| !VersionKey::new(id).is_prerelease())
            .next_back()
    }

    /// First file named exactly `identifier`, in search order.
    pub fn find(&self, identifier: &str) -> Option<PathBuf> {
        if identifier.is_empty() || Path::new(identifier).components().count() != 1 {
            return None;
        }
        self.dirs
            .iter()
            .map(|dir| dir.join(identifier))
            .find(|p| p.is_file())
    }
}

fn matches_prefix(id: &str, prefix: &str) -> bool {
    let Some(rest) = id.strip_prefix(prefix) else {
        return false;
    };
    let prefix_ends_in_digit = prefix.ends_with(|c: char| c.is_ascii_digit());
    !(prefix_ends_in_digit && rest.starts_with(|c: char| c.is_ascii_digit()))
}
