//! Runtime settings, read once from the environment.
//!
//! Nothing below consults the environment again after [`Settings::from_env`]
//! returns; tests build a `Settings` value directly.

use dirs::data_dir;
use std::path::{Path, PathBuf};

/// Major version prepended to bare specs like `21` or `21rc1`.
pub const DEFAULT_MAJOR: &str = "1";

/// Executable checked after install when a definition does not name one.
pub const DEFAULT_EXECUTABLE: &str = "go";

/// Returns the tool home, or None if the user's data directory cannot be resolved.
pub fn try_vbuild_root() -> Option<PathBuf> {
    if let Some(val) = std::env::var_os("VBUILD_ROOT") {
        return Some(PathBuf::from(val));
    }
    data_dir().map(|d| d.join("vbuild"))
}

/// Bundled definitions: `<root>/definitions`
pub fn default_definitions_dir(root: &Path) -> PathBuf {
    root.join("definitions")
}

/// Artifact cache: `<root>/cache`
pub fn default_cache_dir(root: &Path) -> PathBuf {
    root.join("cache")
}

/// Extract the filename from a URL, ignoring any query string or fragment.
pub fn filename_from_url(url: &str) -> &str {
    let url = url.split(['#', '?']).next().unwrap_or(url);
    url.split('/').next_back().unwrap_or("")
}

/// Address family restriction for network transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IpFamily {
    /// Let the resolver decide
    #[default]
    Any,
    /// Only connect over IPv4
    V4,
    /// Only connect over IPv6
    V6,
}

/// Everything configurable about an invocation apart from the request itself.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Definition search path, in priority order.
    pub definition_dirs: Vec<PathBuf>,
    /// Artifact cache root, if caching is enabled.
    pub cache_dir: Option<PathBuf>,
    /// Checksum-addressed mirror base URL.
    pub mirror_url: Option<String>,
    /// Parent directory for build workspaces and logs.
    pub tmp_dir: PathBuf,
    /// Explicit build workspace, overriding the generated one.
    pub build_dir: Option<PathBuf>,
    /// Preferred HTTP transport name (`reqwest`, `curl`).
    pub http_client: Option<String>,
    /// Major version prepended to bare specs.
    pub major: String,
    /// Executable verified after install.
    pub executable: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            definition_dirs: Vec::new(),
            cache_dir: None,
            mirror_url: None,
            tmp_dir: std::env::temp_dir(),
            build_dir: None,
            http_client: None,
            major: DEFAULT_MAJOR.to_string(),
            executable: DEFAULT_EXECUTABLE.to_string(),
        }
    }
}

impl Settings {
    /// Load settings from environment variables.
    pub fn from_env() -> Self {
        let root = try_vbuild_root();
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

        let mut definition_dirs: Vec<PathBuf> = std::env::var_os("VBUILD_DEFINITIONS")
            .map(|v| std::env::split_paths(&v).collect())
            .unwrap_or_default();
        definition_dirs.retain(|d| !d.as_os_str().is_empty());
        if let Some(root) = &root {
            definition_dirs.push(default_definitions_dir(root));
        }

        let cache_dir = non_empty("VBUILD_CACHE_PATH").map(PathBuf::from).or_else(|| {
            root.as_deref()
                .map(default_cache_dir)
                .filter(|p| p.is_dir())
        });

        let mirror_url = if non_empty("VBUILD_SKIP_MIRROR").is_some() {
            None
        } else {
            non_empty("VBUILD_MIRROR_URL").map(|u| u.trim_end_matches('/').to_string())
        };

        Self {
            definition_dirs,
            cache_dir,
            mirror_url,
            tmp_dir: std::env::temp_dir(),
            build_dir: non_empty("VBUILD_BUILD_PATH").map(PathBuf::from),
            http_client: non_empty("VBUILD_HTTP_CLIENT"),
            major: non_empty("VBUILD_MAJOR").unwrap_or_else(|| DEFAULT_MAJOR.to_string()),
            executable: non_empty("VBUILD_EXECUTABLE")
                .unwrap_or_else(|| DEFAULT_EXECUTABLE.to_string()),
        }
    }
}
