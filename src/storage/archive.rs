//! Compression of a finished bundle directory into a `.tar.gz` archive.

use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::storage::StorageError;

/// Extension appended to the output location when compressing.
pub const ARCHIVE_EXT: &str = ".tar.gz";

/// Extensions accepted on an output location that names the archive.
const ARCHIVE_EXTS: [&str; 2] = [".tar.gz", ".tgz"];

/// Split an output location into the working directory and the archive path.
///
/// `out.tgz` and `out.tar.gz` keep their name for the archive and write into
/// `out`; any other location gets [`ARCHIVE_EXT`] appended.
pub fn archive_paths(output: &Path) -> (PathBuf, PathBuf) {
    if let Some(s) = output.to_str() {
        for ext in ARCHIVE_EXTS {
            if let Some(stem) = s.strip_suffix(ext).filter(|stem| !stem.is_empty()) {
                return (PathBuf::from(stem), output.to_path_buf());
            }
        }
    }
    let mut archive = OsString::from(output.as_os_str());
    archive.push(ARCHIVE_EXT);
    (output.to_path_buf(), PathBuf::from(archive))
}

/// Pack `dir` into a gzip-compressed tarball at `archive`, then remove `dir`.
///
/// The archive holds a single top-level directory named after `dir`. When
/// packing fails the directory is kept and the partial archive removed.
///
/// # Errors
/// [`StorageError::OutputExists`] if `archive` already exists, otherwise
/// [`StorageError::Archive`] or [`StorageError::Io`].
pub fn compress_dir(dir: &Path, archive: &Path) -> Result<(), StorageError> {
    let name = dir
        .file_name()
        .ok_or_else(|| StorageError::Archive(format!("not a bundle directory: {}", dir.display())))?;

    let file = match File::create_new(archive) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(StorageError::OutputExists(archive.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    if let Err(e) = pack(file, name, dir) {
        let _ = std::fs::remove_file(archive);
        return Err(StorageError::Archive(format!(
            "failed to compress {}: {e}",
            dir.display()
        )));
    }

    std::fs::remove_dir_all(dir)?;
    tracing::debug!(archive = %archive.display(), "Bundle compressed");
    Ok(())
}

fn pack(file: File, name: &std::ffi::OsStr, dir: &Path) -> std::io::Result<()> {
    let mut tar = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    tar.append_dir_all(name, dir)?;
    tar.into_inner()?.finish()?.sync_all()
}
