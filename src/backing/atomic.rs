//! Atomic file replacement that keeps the previous file's permissions
//!
//! Content is written to `<path>.tmp` and renamed over the target. When the
//! target already exists its mode and owner carry over to the new file,
//! otherwise the file is created with mode 0640.

use crate::error::{io_error, StorageError};
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DEFAULT_MODE: u32 = 0o640;

/// Sibling temp path used while replacing `path`
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(unix)]
fn open_temp(temp: &Path, previous: Option<&fs::Metadata>) -> Result<fs::File, StorageError> {
    use std::os::unix::fs::{MetadataExt, OpenOptionsExt, PermissionsExt};

    let mode = previous
        .map(|meta| meta.permissions().mode() & 0o7777)
        .unwrap_or(DEFAULT_MODE);
    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(temp)
        .map_err(|e| io_error(temp, e))?;

    if let Some(meta) = previous {
        // Ownership can only be handed over with sufficient privileges.
        if let Err(e) = std::os::unix::fs::chown(temp, Some(meta.uid()), Some(meta.gid())) {
            tracing::debug!(path = %temp.display(), error = %e, "could not preserve owner");
        }
        fs::set_permissions(temp, fs::Permissions::from_mode(mode))
            .map_err(|e| io_error(temp, e))?;
    }
    Ok(file)
}

#[cfg(not(unix))]
fn open_temp(temp: &Path, _previous: Option<&fs::Metadata>) -> Result<fs::File, StorageError> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(temp)
        .map_err(|e| io_error(temp, e))
}

/// Replace `path` with `content` atomically.
///
/// Returns the number of bytes written.
pub fn write_preserving(path: &Path, content: &[u8]) -> Result<usize, StorageError> {
    let previous = fs::metadata(path).ok();
    let temp = temp_path(path);

    let result = open_temp(&temp, previous.as_ref()).and_then(|mut file| {
        file.write_all(content).map_err(|e| io_error(&temp, e))?;
        file.sync_all().map_err(|e| io_error(&temp, e))
    });
    if let Err(e) = result {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }

    fs::rename(&temp, path).map_err(|e| {
        let _ = fs::remove_file(&temp);
        io_error(path, e)
    })?;
    Ok(content.len())
}
