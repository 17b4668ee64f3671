//! Reporter trait for dependency injection
//!
//! This trait allows core logic to report progress and status without
//! being coupled to a specific terminal implementation.

use std::path::Path;

pub trait Reporter: Send + Sync {
    /// Indicates a new phase has started (e.g. "Resolving", "Installing").
    fn section(&self, title: &str);

    /// Updates the progress of a download.
    fn downloading(&self, file: &str, current: u64, total: Option<u64>);

    /// An artifact was satisfied from the working directory or the cache.
    fn reused(&self, file: &str, from: &Path);

    /// Updates the state of an artifact to 'extracting'.
    fn extracting(&self, file: &str);

    /// Updates the state of an install to 'installing into prefix'.
    fn installing(&self, name: &str, prefix: &Path);

    /// Marks the install as successfully completed.
    fn done(&self, name: &str, prefix: &Path);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Log an error message.
    fn error(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn section(&self, title: &str) {
        (**self).section(title);
    }
    fn downloading(&self, file: &str, current: u64, total: Option<u64>) {
        (**self).downloading(file, current, total);
    }
    fn reused(&self, file: &str, from: &Path) {
        (**self).reused(file, from);
    }
    fn extracting(&self, file: &str) {
        (**self).extracting(file);
    }
    fn installing(&self, name: &str, prefix: &Path) {
        (**self).installing(name, prefix);
    }
    fn done(&self, name: &str, prefix: &Path) {
        (**self).done(name, prefix);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
    fn error(&self, msg: &str) {
        (**self).error(msg);
    }
}

/// A no-op reporter for silent operations (e.g., listing, testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn downloading(&self, _: &str, _: u64, _: Option<u64>) {}
    fn reused(&self, _: &str, _: &Path) {}
    fn extracting(&self, _: &str) {}
    fn installing(&self, _: &str, _: &Path) {}
    fn done(&self, _: &str, _: &Path) {}
    fn info(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn error(&self, _: &str) {}
}
