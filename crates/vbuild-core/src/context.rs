//! Per-invocation state threaded through every pipeline step.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tracing::{debug, warn};

use crate::error::BuildError;
use crate::paths::Settings;

/// The plain-text log capturing subprocess output for one invocation.
#[derive(Debug, Clone)]
pub struct BuildLog {
    path: PathBuf,
}

impl BuildLog {
    /// Create (or truncate) the log file.
    pub fn create(path: PathBuf) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        File::create(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line. Failures are logged and otherwise ignored.
    pub fn append(&self, line: &str) {
        let result = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .and_then(|mut f| writeln!(f, "{line}"));
        if let Err(e) = result {
            warn!("could not write build log {}: {e}", self.path.display());
        }
    }

    /// Stdout and stderr handles that append to the log.
    pub fn stdio(&self) -> io::Result<(Stdio, Stdio)> {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        Ok((Stdio::from(file.try_clone()?), Stdio::from(file)))
    }

    /// The last `n` lines of the log.
    pub fn tail(&self, n: usize) -> io::Result<Vec<String>> {
        read_last_lines(&self.path, n)
    }
}

/// Working directory, log, prefix and the "install satisfied" flag.
#[derive(Debug)]
pub struct BuildContext {
    pub build_dir: PathBuf,
    pub log: BuildLog,
    pub prefix: PathBuf,
    pub install_satisfied: bool,
    keep_workspace: bool,
    owns_build_dir: bool,
}

impl BuildContext {
    /// Workspace and log under the settings' temp root, named by a
    /// timestamp seed and the process id.
    ///
    /// An explicit `build_dir` from settings is used as-is and is never
    /// removed.
    pub fn create(settings: &Settings, prefix: &Path, keep_workspace: bool) -> Result<Self, BuildError> {
        let seed = format!(
            "{}.{}",
            chrono::Local::now().format("%Y%m%d%H%M%S"),
            std::process::id()
        );
        let log_path = settings.tmp_dir.join(format!("vbuild.{seed}.log"));
        let (build_dir, owns_build_dir) = match &settings.build_dir {
            Some(dir) => (dir.clone(), false),
            None => (settings.tmp_dir.join(format!("vbuild.{seed}")), true),
        };

        let mut ctx = Self::new(build_dir, log_path, prefix, keep_workspace)
            .map_err(|e| BuildError::io_context("failed to create build workspace", e))?;
        ctx.owns_build_dir = owns_build_dir;
        Ok(ctx)
    }

    /// Build a context at explicit locations.
    pub fn new(
        build_dir: PathBuf,
        log_path: PathBuf,
        prefix: &Path,
        keep_workspace: bool,
    ) -> io::Result<Self> {
        fs::create_dir_all(&build_dir)?;
        let log = BuildLog::create(log_path)?;
        let prefix = std::path::absolute(prefix)?;
        debug!(
            "build workspace {} log {}",
            build_dir.display(),
            log.path().display()
        );

        Ok(Self {
            build_dir,
            log,
            prefix,
            install_satisfied: false,
            keep_workspace,
            owns_build_dir: true,
        })
    }

    pub fn keep_workspace(&self) -> bool {
        self.keep_workspace
    }

    /// Fail unless the workspace can hold and run an executable.
    pub fn ensure_executable_workspace(&self) -> Result<(), BuildError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let probe = self.build_dir.join("vbuild-probe.sh");
            let unsuitable = |what: String| {
                BuildError::EnvironmentUnsuitable(format!(
                    "{} cannot hold executables ({what}); set TMPDIR or VBUILD_BUILD_PATH",
                    self.build_dir.display()
                ))
            };

            fs::write(&probe, "#!/bin/sh\nexit 0\n").map_err(|e| unsuitable(e.to_string()))?;
            fs::set_permissions(&probe, fs::Permissions::from_mode(0o755))
                .map_err(|e| unsuitable(e.to_string()))?;
            let ran = std::process::Command::new(&probe)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            fs::remove_file(&probe).ok();

            match ran {
                Ok(status) if status.success() => {}
                Ok(status) => return Err(unsuitable(format!("probe exited with {status}"))),
                Err(e) => return Err(unsuitable(e.to_string())),
            }
        }
        Ok(())
    }

    /// Tear down after the run. Returns the workspace if it was retained.
    ///
    /// On success without retention the workspace and log are removed. On
    /// failure both are kept for inspection.
    pub fn finish(&self, success: bool) -> Option<PathBuf> {
        if success && !self.keep_workspace {
            if self.owns_build_dir {
                if let Err(e) = fs::remove_dir_all(&self.build_dir) {
                    warn!("could not remove {}: {e}", self.build_dir.display());
                }
            }
            fs::remove_file(self.log.path()).ok();
            return None;
        }

        debug!("retaining build workspace {}", self.build_dir.display());
        Some(self.build_dir.clone())
    }
}

/// Read the last N lines from a file without loading all of it.
fn read_last_lines(path: &Path, n: usize) -> io::Result<Vec<String>> {
    const TAIL_SIZE: u64 = 16 * 1024;

    let mut file = File::open(path)?;
    let file_len = file.metadata()?.len();

    let seek_pos = file_len.saturating_sub(TAIL_SIZE);
    file.seek(SeekFrom::Start(seek_pos))?;

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    let buffer = String::from_utf8_lossy(&bytes);

    // Skip the partial first line when we started mid-file
    let content = if seek_pos > 0 {
        buffer.find('\n').map_or(&*buffer, |idx| &buffer[idx + 1..])
    } else {
        &buffer
    };

    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(n);
    Ok(lines[start..].iter().map(|l| (*l).to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn context(root: &Path, keep: bool) -> BuildContext {
        BuildContext::new(
            root.join("build"),
            root.join("build.log"),
            &root.join("prefix"),
            keep,
        )
        .unwrap()
    }

    #[test]
    fn log_appends_and_tails() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path(), false);
        for i in 0..15 {
            ctx.log.append(&format!("line {i}"));
        }
        let tail = ctx.log.tail(10).unwrap();
        assert_eq!(tail.len(), 10);
        assert_eq!(tail[0], "line 5");
        assert_eq!(tail[9], "line 14");
    }

    #[test]
    fn success_removes_workspace_and_log() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path(), false);
        assert!(ctx.build_dir.is_dir());
        assert!(!ctx.prefix.exists());

        assert_eq!(ctx.finish(true), None);
        assert!(!ctx.build_dir.exists());
        assert!(!ctx.log.path().exists());
    }

    #[test]
    fn failure_and_keep_retain_workspace() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path(), false);
        assert_eq!(ctx.finish(false), Some(ctx.build_dir.clone()));
        assert!(ctx.build_dir.is_dir());
        assert!(ctx.log.path().is_file());

        let kept = context(&dir.path().join("k"), true);
        assert!(kept.finish(true).is_some());
        assert!(kept.build_dir.is_dir());
    }

    #[test]
    fn explicit_build_dir_is_never_removed() {
        let dir = tempdir().unwrap();
        let settings = Settings {
            tmp_dir: dir.path().to_path_buf(),
            build_dir: Some(dir.path().join("mine")),
            ..Settings::default()
        };
        let ctx = BuildContext::create(&settings, &dir.path().join("prefix"), false).unwrap();
        ctx.finish(true);
        assert!(dir.path().join("mine").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn temp_workspace_can_run_executables() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path(), false);
        ctx.ensure_executable_workspace().unwrap();
        assert!(!ctx.build_dir.join("vbuild-probe.sh").exists());
    }
}
