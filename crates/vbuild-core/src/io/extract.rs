//! Archive extraction
//!
//! Handles tar (plain, gzip, bzip2, xz, zstd) and zip archives. The format
//! is picked from the filename suffix.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use zip::ZipArchive;
use zstd::stream::Decoder as ZstdDecoder;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Unsafe path in archive: {}", .0.display())]
    UnsafePath(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    TarBz2,
    TarXz,
    TarZst,
    Tar,
    Zip,
}

/// Detect archive format from file extension. Unknown tarball suffixes are
/// treated as gzip.
pub fn detect_format(path: &Path) -> ArchiveFormat {
    let name = path.to_string_lossy().to_lowercase();

    if name.ends_with(".zip") {
        ArchiveFormat::Zip
    } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") || name.ends_with(".tbz") {
        ArchiveFormat::TarBz2
    } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
        ArchiveFormat::TarXz
    } else if name.ends_with(".tar.zst") || name.ends_with(".tzst") {
        ArchiveFormat::TarZst
    } else if name.ends_with(".tar") {
        ArchiveFormat::Tar
    } else {
        ArchiveFormat::TarGz
    }
}

/// Extract an archive into `dest_dir`, auto-detecting the format.
///
/// Returns the number of regular files written.
pub fn extract_auto(archive_path: &Path, dest_dir: &Path) -> Result<usize, ExtractError> {
    let format = detect_format(archive_path);
    debug!("extracting {} as {format:?}", archive_path.display());

    if format == ArchiveFormat::Zip {
        return extract_zip(archive_path, dest_dir);
    }

    let reader = BufReader::new(File::open(archive_path)?);
    match format {
        ArchiveFormat::TarGz => extract_tar(flate2::read::GzDecoder::new(reader), dest_dir),
        ArchiveFormat::TarBz2 => extract_tar(bzip2::read::BzDecoder::new(reader), dest_dir),
        ArchiveFormat::TarXz => extract_tar(xz2::read::XzDecoder::new(reader), dest_dir),
        ArchiveFormat::TarZst => extract_tar(ZstdDecoder::new(reader)?, dest_dir),
        ArchiveFormat::Tar | ArchiveFormat::Zip => extract_tar(reader, dest_dir),
    }
}

/// Reject absolute paths and any `..` component.
fn check_relative(path: &Path) -> Result<(), ExtractError> {
    let escapes = path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(ExtractError::UnsafePath(path.to_path_buf()));
    }
    Ok(())
}

/// Extract a tar archive from a reader
///
/// Entries are unpacked with `unpack_in`, which refuses to write through a
/// symlink or hardlink that leads outside `dest_dir`.
fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<usize, ExtractError> {
    fs::create_dir_all(dest_dir)?;

    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    let mut count = 0;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let relative_path = entry.path()?.into_owned();
        check_relative(&relative_path)?;

        let is_file = entry.header().entry_type().is_file();
        if !entry.unpack_in(dest_dir)? {
            return Err(ExtractError::UnsafePath(relative_path));
        }
        if is_file {
            count += 1;
        }
    }

    Ok(count)
}

/// Extract a zip archive
fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<usize, ExtractError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| ExtractError::Archive(e.to_string()))?;

    fs::create_dir_all(dest_dir)?;
    let mut count = 0;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| ExtractError::Archive(e.to_string()))?;
        let Some(relative_path) = file.enclosed_name() else {
            return Err(ExtractError::UnsafePath(PathBuf::from(file.name())));
        };

        let absolute_path = dest_dir.join(&relative_path);
        if file.is_dir() {
            fs::create_dir_all(&absolute_path)?;
            continue;
        }
        if let Some(p) = absolute_path.parent() {
            fs::create_dir_all(p)?;
        }

        let mut outfile = File::create(&absolute_path)?;
        io::copy(&mut file, &mut outfile)?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&absolute_path, fs::Permissions::from_mode(mode & 0o7777))?;
        }
        count += 1;
    }

    Ok(count)
}

/// Detect if a directory has a single top-level directory and strip it by moving contents up.
///
/// The top-level directory is renamed out of the way first, so a child with
/// the same name (`tool/tool`) can take its place.
pub fn strip_components(dir: &Path) -> Result<(), ExtractError> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<io::Result<_>>()?;

    // .DS_Store and friends
    entries.retain(|e| !e.file_name().to_string_lossy().starts_with('.'));

    if entries.len() != 1 || !entries[0].file_type()?.is_dir() {
        return Ok(());
    }

    let mut staging = dir.join(".vbuild-strip");
    let mut n = 0;
    while staging.symlink_metadata().is_ok() {
        n += 1;
        staging = dir.join(format!(".vbuild-strip.{n}"));
    }
    fs::rename(entries[0].path(), &staging)?;

    for entry in fs::read_dir(&staging)? {
        let entry = entry?;
        fs::rename(entry.path(), dir.join(entry.file_name()))?;
    }
    fs::remove_dir(staging)?;

    Ok(())
}
