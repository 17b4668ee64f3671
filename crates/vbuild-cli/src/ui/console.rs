//! Line-oriented reporter writing to stderr.

use std::path::Path;
use std::sync::Mutex;

use vbuild_core::Reporter;

use super::progress::format_progress;

/// Prints progress to stderr. With `quiet`, only warnings and errors.
#[derive(Debug)]
pub struct ConsoleReporter {
    quiet: bool,
    /// Last reported download decile, to avoid a line per chunk.
    last_step: Mutex<Option<u64>>,
}

impl ConsoleReporter {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            last_step: Mutex::new(None),
        }
    }

    fn say(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{msg}");
        }
    }

    /// Whether this progress update crosses a new 10% step.
    fn should_report(&self, current: u64, total: Option<u64>) -> bool {
        let step = match total.filter(|&t| t > 0) {
            Some(t) => current.min(t) * 10 / t,
            // Unknown size: every 4 MiB
            None => current / (4 * 1024 * 1024),
        };
        let Ok(mut last) = self.last_step.lock() else {
            return false;
        };
        if current == 0 {
            *last = None;
        }
        if *last == Some(step) {
            return false;
        }
        *last = Some(step);
        true
    }
}

impl Reporter for ConsoleReporter {
    fn section(&self, title: &str) {
        self.say(&format!("==> {title}"));
    }

    fn downloading(&self, file: &str, current: u64, total: Option<u64>) {
        if !self.quiet && self.should_report(current, total) {
            eprintln!("Downloading {file}: {}", format_progress(current, total));
        }
    }

    fn reused(&self, file: &str, from: &Path) {
        self.say(&format!("Reusing {file} from {}", from.display()));
    }

    fn extracting(&self, file: &str) {
        self.say(&format!("Extracting {file}"));
    }

    fn installing(&self, name: &str, prefix: &Path) {
        self.say(&format!("Installing {name} to {}", prefix.display()));
    }

    fn done(&self, name: &str, prefix: &Path) {
        self.say(&format!("Installed {name} to {}", prefix.display()));
    }

    fn info(&self, msg: &str) {
        self.say(msg);
    }

    fn warning(&self, msg: &str) {
        eprintln!("warning: {msg}");
    }

    fn error(&self, msg: &str) {
        eprintln!("error: {msg}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_throttled_to_steps() {
        let r = ConsoleReporter::new(false);
        assert!(r.should_report(0, Some(1000)));
        assert!(!r.should_report(50, Some(1000)));
        assert!(r.should_report(100, Some(1000)));
        assert!(!r.should_report(150, Some(1000)));
        assert!(r.should_report(1000, Some(1000)));
        // A new download starts over.
        assert!(r.should_report(0, Some(10)));
    }
}
