//! Filename-keyed artifact cache.
//!
//! Entries are plain files named by the canonical artifact filename under the
//! cache root. The cache is append-mostly: entries are added, never edited in
//! place, and a corrupt entry is simply ignored.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::checksum::Verifier;

/// Where a reused artifact came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reused {
    /// Already present in the build workspace.
    Workspace(PathBuf),
    /// Linked in from the cache root.
    Cache(PathBuf),
}

impl Reused {
    pub fn path(&self) -> &Path {
        match self {
            Self::Workspace(p) | Self::Cache(p) => p,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: Option<PathBuf>,
    verifier: Verifier,
}

impl ArtifactCache {
    pub fn new(root: Option<PathBuf>, verifier: Verifier) -> Self {
        Self { root, verifier }
    }

    /// A cache that stores nothing; only the workspace copy can be reused.
    pub fn disabled(verifier: Verifier) -> Self {
        Self::new(None, verifier)
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn entry_path(&self, filename: &str) -> Option<PathBuf> {
        self.root.as_ref().map(|r| r.join(filename))
    }

    /// Try to satisfy `filename` without the network.
    ///
    /// A copy already in `workdir` wins. Otherwise a cached copy is linked
    /// into `workdir`. Either one must verify against `checksum`; a cached
    /// copy that does not is left alone and `None` is returned.
    pub fn reuse(&self, filename: &str, checksum: &str, workdir: &Path) -> Option<Reused> {
        let local = workdir.join(filename);
        if local.is_file() && self.verifies(&local, checksum) {
            debug!("reusing {} from workspace", local.display());
            return Some(Reused::Workspace(local));
        }

        let cached = self.entry_path(filename)?;
        if !cached.is_file() {
            return None;
        }
        if !self.verifies(&cached, checksum) {
            warn!(
                "cached {} does not match its checksum, fetching again",
                cached.display()
            );
            return None;
        }

        if let Err(e) = replace_with_link(&cached, &local) {
            warn!("could not link {} from cache: {e}", cached.display());
            return None;
        }
        debug!("reusing {} from cache", cached.display());
        Some(Reused::Cache(cached))
    }

    /// Move a verified download into the cache and link it back.
    ///
    /// Returns the cache entry, or `None` when caching is disabled. The
    /// downloaded file stays usable at `downloaded` either way.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be moved or linked; the
    /// caller treats this as non-fatal.
    pub fn store(&self, filename: &str, downloaded: &Path) -> io::Result<Option<PathBuf>> {
        let Some(entry) = self.entry_path(filename) else {
            return Ok(None);
        };
        if let Some(parent) = entry.parent() {
            fs::create_dir_all(parent)?;
        }

        move_file(downloaded, &entry)?;
        replace_with_link(&entry, downloaded)?;
        debug!("cached {} at {}", filename, entry.display());
        Ok(Some(entry))
    }

    fn verifies(&self, path: &Path, checksum: &str) -> bool {
        matches!(self.verifier.verify(path, checksum), Ok(v) if v.is_ok())
    }
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // Cross-device: copy then remove.
    fs::copy(from, to)?;
    fs::remove_file(from)
}

fn replace_with_link(target: &Path, link: &Path) -> io::Result<()> {
    if link.symlink_metadata().is_ok() {
        fs::remove_file(link)?;
    }
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link)
    }
    #[cfg(not(unix))]
    {
        fs::copy(target, link).map(|_| ())
    }
}
