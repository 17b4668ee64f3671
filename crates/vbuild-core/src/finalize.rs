//! Post-extraction steps: copy into the prefix, normalise permissions,
//! create compatibility links, and check the primary executable runs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Result;
use regex::Regex;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::context::BuildLog;
use crate::error::BuildError;

/// `tool1.21`, `python3`, `gofmt-1.21`
const VERSIONED_NAME: &str = r"^([A-Za-z][A-Za-z_-]*?)-?(\d+(?:\.\d+)*)$";

/// Recursively copy a directory tree from `src` to `dst`, overwriting.
///
/// # Errors
///
/// Returns an error if the copy fails.
pub fn copy_dir_all(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<()> {
    fs::create_dir_all(dst.as_ref())?;
    fs_extra::dir::copy(
        src,
        dst,
        &fs_extra::dir::CopyOptions::new()
            .content_only(true)
            .overwrite(true),
    )
    .map_err(|e| anyhow::anyhow!("Copy failed: {e}"))?;
    Ok(())
}

/// Remove group- and world-writable bits from every directory under `root`.
pub fn normalize_permissions(root: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        for entry in WalkDir::new(root) {
            let entry = entry.map_err(|e| {
                warn!("cannot normalise permissions under {}: {e}", root.display());
                io::Error::from(e)
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let mut perms = entry.metadata().map_err(io::Error::other)?.permissions();
            let mode = perms.mode();
            if mode & 0o022 != 0 {
                perms.set_mode(mode & !0o022);
                fs::set_permissions(entry.path(), perms)?;
            }
        }
    }
    #[cfg(not(unix))]
    let _ = root;
    Ok(())
}

/// Alias versioned executables in `bin_dir` by their unversioned name.
///
/// Names are visited in sorted order, so the first candidate for a base
/// name claims the alias. Nothing that already exists is replaced.
/// Returns the links created.
pub fn create_compat_links(bin_dir: &Path) -> io::Result<Vec<PathBuf>> {
    if !bin_dir.is_dir() {
        return Ok(Vec::new());
    }
    let pattern = Regex::new(VERSIONED_NAME).map_err(io::Error::other)?;

    let mut names: Vec<String> = fs::read_dir(bin_dir)?
        .filter_map(std::result::Result::ok)
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();
    names.sort();

    let mut created = Vec::new();
    for name in &names {
        let Some(caps) = pattern.captures(name) else {
            continue;
        };
        let base = caps[1].trim_end_matches('-');
        let link = bin_dir.join(base);
        if link.symlink_metadata().is_ok() {
            continue;
        }

        #[cfg(unix)]
        std::os::unix::fs::symlink(name, &link)?;
        #[cfg(not(unix))]
        fs::copy(bin_dir.join(name), &link)?;

        debug!("linked {} -> {name}", link.display());
        created.push(link);
    }
    Ok(created)
}

/// Check `<prefix>/bin/<executable>` exists, is executable and runs `args`
/// successfully. Output goes to the build log.
///
/// # Errors
///
/// `BuildError::InvalidExecutable` on any failure.
pub fn verify_executable(
    prefix: &Path,
    executable: &str,
    args: &[String],
    log: &BuildLog,
) -> Result<PathBuf, BuildError> {
    let path = prefix.join("bin").join(executable);
    let invalid = || BuildError::InvalidExecutable(path.clone());

    let meta = fs::metadata(&path).map_err(|_| invalid())?;
    if !meta.is_file() {
        return Err(invalid());
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if meta.permissions().mode() & 0o111 == 0 {
            return Err(invalid());
        }
    }

    log.append(&format!("{} {}", path.display(), args.join(" ")));
    let (stdout, stderr) = log.stdio()?;
    let status = Command::new(&path)
        .args(args)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .status()
        .map_err(|_| invalid())?;

    if !status.success() {
        return Err(invalid());
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn copy_overwrites_existing_content() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        fs::create_dir(src.path().join("bin")).unwrap();
        fs::write(src.path().join("bin/tool"), "new").unwrap();
        fs::create_dir(dst.path().join("bin")).unwrap();
        fs::write(dst.path().join("bin/tool"), "old").unwrap();
        fs::write(dst.path().join("keep"), "mine").unwrap();

        copy_dir_all(src.path(), dst.path()).unwrap();

        assert_eq!(fs::read_to_string(dst.path().join("bin/tool")).unwrap(), "new");
        assert!(dst.path().join("keep").exists());
    }

    #[cfg(unix)]
    #[test]
    fn writable_directories_are_tightened() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempdir().unwrap();
        let sub = root.path().join("lib");
        fs::create_dir(&sub).unwrap();
        fs::set_permissions(&sub, fs::Permissions::from_mode(0o777)).unwrap();
        let file = sub.join("data");
        fs::write(&file, "").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o666)).unwrap();

        normalize_permissions(root.path()).unwrap();

        assert_eq!(fs::metadata(&sub).unwrap().permissions().mode() & 0o777, 0o755);
        assert_eq!(fs::metadata(&file).unwrap().permissions().mode() & 0o777, 0o666);
    }

    #[cfg(unix)]
    #[test]
    fn walk_errors_are_reported() {
        let dir = tempdir().unwrap();
        let err = normalize_permissions(&dir.path().join("missing")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn compat_links_never_replace_files() {
        let bin = tempdir().unwrap();
        for name in ["tool1.21", "tool1.22", "gofmt-1.21", "python3", "python"] {
            fs::write(bin.path().join(name), "").unwrap();
        }

        let created = create_compat_links(bin.path()).unwrap();
        let mut names: Vec<_> = created
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();

        assert_eq!(names, vec!["gofmt", "tool"]);
        assert_eq!(
            fs::read_link(bin.path().join("tool")).unwrap(),
            PathBuf::from("tool1.21")
        );
        assert_eq!(
            fs::read_link(bin.path().join("gofmt")).unwrap(),
            PathBuf::from("gofmt-1.21")
        );
        assert!(fs::symlink_metadata(bin.path().join("python")).unwrap().is_file());
    }

    #[test]
    fn missing_bin_dir_creates_nothing() {
        let dir = tempdir().unwrap();
        assert!(create_compat_links(&dir.path().join("bin")).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn executable_must_exist_and_run() {
        use std::os::unix::fs::PermissionsExt;

        let prefix = tempdir().unwrap();
        let log = BuildLog::create(prefix.path().join("v.log")).unwrap();
        fs::create_dir(prefix.path().join("bin")).unwrap();
        let exe = prefix.path().join("bin/tool");
        let args = vec!["version".to_string()];

        assert!(matches!(
            verify_executable(prefix.path(), "tool", &args, &log),
            Err(BuildError::InvalidExecutable(_))
        ));

        fs::write(&exe, "#!/bin/sh\necho \"tool $1\"\n").unwrap();
        assert!(verify_executable(prefix.path(), "tool", &args, &log).is_err());

        fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(
            verify_executable(prefix.path(), "tool", &args, &log).unwrap(),
            exe
        );
        assert!(fs::read_to_string(log.path()).unwrap().contains("tool version"));

        fs::write(&exe, "#!/bin/sh\nexit 3\n").unwrap();
        assert!(verify_executable(prefix.path(), "tool", &args, &log).is_err());
    }
}
