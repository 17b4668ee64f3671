//! Operating system and CPU architecture names.
//!
//! Definitions are written by hand and use whatever spelling the upstream
//! download page uses (`amd64`, `x86_64`, `darwin`, `macos`, ...). Both sides
//! of a platform comparison are normalised through these enums so that
//! aliases compare equal.
//!
//! # Example
//!
//! ```
//! use vbuild_schema::Arch;
//!
//! assert_eq!(Arch::parse("amd64"), Arch::parse("x86_64"));
//! ```

use serde::{Deserialize, Serialize};

/// Operating system family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Os {
    /// Linux (any distribution)
    Linux,
    /// macOS
    Darwin,
    /// FreeBSD
    FreeBsd,
    /// OpenBSD
    OpenBsd,
    /// NetBSD
    NetBsd,
    /// Windows
    Windows,
    /// Anything else, kept verbatim (lowercased)
    Other(String),
}

impl Os {
    /// Get the operating system this binary was compiled for.
    pub fn current() -> Self {
        Self::parse(std::env::consts::OS)
    }

    /// Normalise an OS name, accepting common aliases.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "linux" => Self::Linux,
            "darwin" | "macos" | "osx" => Self::Darwin,
            "freebsd" => Self::FreeBsd,
            "openbsd" => Self::OpenBsd,
            "netbsd" => Self::NetBsd,
            "windows" | "win" => Self::Windows,
            other => Self::Other(other.to_string()),
        }
    }

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Linux => "linux",
            Self::Darwin => "darwin",
            Self::FreeBsd => "freebsd",
            Self::OpenBsd => "openbsd",
            Self::NetBsd => "netbsd",
            Self::Windows => "windows",
            Self::Other(s) => s,
        }
    }
}

impl std::fmt::Display for Os {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for Os {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<Os> for String {
    fn from(os: Os) -> Self {
        os.as_str().to_string()
    }
}

/// CPU architecture.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Arch {
    /// 64-bit x86 (`amd64`, `x86_64`)
    X86_64,
    /// 32-bit x86 (`386`, `i686`)
    X86,
    /// 64-bit ARM (`arm64`, `aarch64`)
    Arm64,
    /// 32-bit ARM (`armv6l`, `armv7l`)
    Arm,
    /// Little-endian 64-bit POWER
    Ppc64le,
    /// IBM Z
    S390x,
    /// 64-bit RISC-V
    Riscv64,
    /// Anything else, kept verbatim (lowercased)
    Other(String),
}

impl Arch {
    /// Get the architecture this binary was compiled for.
    pub fn current() -> Self {
        Self::parse(std::env::consts::ARCH)
    }

    /// Normalise an architecture name, accepting common aliases.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "x86_64" | "amd64" | "x64" => Self::X86_64,
            "x86" | "386" | "i386" | "i686" => Self::X86,
            "arm64" | "aarch64" => Self::Arm64,
            "arm" | "armv6l" | "armv7l" | "armhf" => Self::Arm,
            "ppc64le" | "powerpc64le" => Self::Ppc64le,
            "s390x" => Self::S390x,
            "riscv64" => Self::Riscv64,
            other => Self::Other(other.to_string()),
        }
    }

    /// Go-style architecture name (`amd64`, `arm64`, ...), the spelling most
    /// release pages use.
    pub fn as_str(&self) -> &str {
        match self {
            Self::X86_64 => "amd64",
            Self::X86 => "386",
            Self::Arm64 => "arm64",
            Self::Arm => "armv6l",
            Self::Ppc64le => "ppc64le",
            Self::S390x => "s390x",
            Self::Riscv64 => "riscv64",
            Self::Other(s) => s,
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for Arch {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<Arch> for String {
    fn from(arch: Arch) -> Self {
        arch.as_str().to_string()
    }
}
