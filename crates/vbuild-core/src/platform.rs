//! Host platform facts and predicate evaluation.

use std::cmp::Ordering;
use std::process::Command;

use vbuild_schema::{Arch, Os};

use crate::definition::{OsVersionRange, PlatformPredicate};

/// The facts a predicate is evaluated against.
///
/// Detected once per invocation; nothing caches it beyond the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
    /// Release number of the OS (`14.2.1` on macOS, kernel release elsewhere).
    pub os_version: Option<String>,
}

impl Platform {
    /// Read the host's OS, architecture and OS version.
    pub fn detect() -> Self {
        let os = Os::current();
        let os_version = detect_os_version(&os);
        Self {
            os,
            arch: Arch::current(),
            os_version,
        }
    }

    /// Platform with fixed facts, for tests and cross-checks.
    pub fn new(os: Os, arch: Arch, os_version: Option<&str>) -> Self {
        Self {
            os,
            arch,
            os_version: os_version.map(str::to_string),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.os, self.arch)?;
        if let Some(v) = &self.os_version {
            write!(f, " ({v})")?;
        }
        Ok(())
    }
}

fn detect_os_version(os: &Os) -> Option<String> {
    let output = match os {
        Os::Darwin => Command::new("sw_vers").arg("-productVersion").output(),
        Os::Windows => return None,
        _ => Command::new("uname").arg("-r").output(),
    }
    .ok()
    .filter(|o| o.status.success())?;

    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!version.is_empty()).then_some(version)
}

impl PlatformPredicate {
    /// Evaluate against platform facts. Pure: performs no I/O.
    pub fn matches(&self, platform: &Platform) -> bool {
        if self.os != platform.os || self.arch != platform.arch {
            return false;
        }
        match &self.os_version {
            None => true,
            Some(range) => platform
                .os_version
                .as_deref()
                .is_some_and(|v| range.contains(v)),
        }
    }
}

impl OsVersionRange {
    /// Returns `true` if `version` is within `[min, max)`.
    pub fn contains(&self, version: &str) -> bool {
        let above_min = self
            .min
            .as_deref()
            .is_none_or(|min| compare_dotted(version, min) != Ordering::Less);
        let below_max = self
            .max
            .as_deref()
            .is_none_or(|max| compare_dotted(version, max) == Ordering::Less);
        above_min && below_max
    }
}

/// Compare dotted numeric versions (`10.15.7`, `6.1.0-13-amd64`), reading the
/// leading digits of each segment and treating missing segments as zero.
fn compare_dotted(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.')
            .map(|s| {
                let digits: String = s.chars().take_while(char::is_ascii_digit).collect();
                digits.parse().unwrap_or(0)
            })
            .collect()
    };

    let a_parts = parse(a);
    let b_parts = parse(b);
    for i in 0..std::cmp::max(a_parts.len(), b_parts.len()) {
        let av = a_parts.get(i).unwrap_or(&0);
        let bv = b_parts.get(i).unwrap_or(&0);
        match av.cmp(bv) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux_amd64() -> Platform {
        Platform::new(Os::Linux, Arch::X86_64, Some("6.1.0-13-amd64"))
    }

    fn predicate(os: &str, arch: &str, range: Option<OsVersionRange>) -> PlatformPredicate {
        PlatformPredicate {
            os: Os::parse(os),
            arch: Arch::parse(arch),
            os_version: range,
        }
    }

    #[test]
    fn os_and_arch_must_both_match() {
        let host = linux_amd64();
        assert!(predicate("linux", "amd64", None).matches(&host));
        assert!(predicate("linux", "x86_64", None).matches(&host));
        assert!(!predicate("linux", "arm64", None).matches(&host));
        assert!(!predicate("darwin", "amd64", None).matches(&host));
    }

    #[test]
    fn version_range_is_half_open() {
        let range = OsVersionRange {
            min: Some("10.13".into()),
            max: Some("11".into()),
        };
        assert!(range.contains("10.13"));
        assert!(range.contains("10.15.7"));
        assert!(!range.contains("10.12.6"));
        assert!(!range.contains("11.0"));
        assert!(OsVersionRange::default().contains("1.0"));
    }

    #[test]
    fn kernel_release_suffixes_are_ignored() {
        let range = OsVersionRange {
            min: Some("5.10".into()),
            max: None,
        };
        assert!(predicate("linux", "amd64", Some(range)).matches(&linux_amd64()));
    }

    #[test]
    fn unknown_os_version_fails_ranged_predicates() {
        let host = Platform::new(Os::Linux, Arch::X86_64, None);
        let ranged = predicate(
            "linux",
            "amd64",
            Some(OsVersionRange {
                min: Some("1".into()),
                max: None,
            }),
        );
        assert!(!ranged.matches(&host));
        assert!(predicate("linux", "amd64", None).matches(&host));
    }

    #[test]
    fn display_includes_version_when_known() {
        assert_eq!(linux_amd64().to_string(), "linux amd64 (6.1.0-13-amd64)");
        assert_eq!(
            Platform::new(Os::Darwin, Arch::Arm64, None).to_string(),
            "darwin arm64"
        );
    }
}
