//! Filesystem helpers shared by every stage that writes an artifact.
//!
//! Artifacts are written to a temporary file in the destination directory and
//! renamed into place, so a concurrent reader sees either the previous file or
//! the complete new one.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{Result, UsbCertError};

/// Owner read/write only.
pub const PRIVATE_FILE_MODE: u32 = 0o600;
/// Owner read/write, everyone else read.
pub const PUBLIC_FILE_MODE: u32 = 0o644;

/// Creates the parent directory of `path` if it is missing.
///
/// Best effort: a failure is logged and otherwise ignored; the subsequent
/// write reports the real problem.
pub fn ensure_parent_dir(path: &Path) {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return;
    };
    if parent.is_dir() {
        return;
    }
    match fs::create_dir_all(parent) {
        Ok(()) => debug!(dir = %parent.display(), "created output directory"),
        Err(err) => warn!(dir = %parent.display(), error = %err, "could not create output directory"),
    }
}

/// Atomically replaces `path` with `contents`, applying `mode` on Unix.
pub fn write_atomic(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| UsbCertError::io(path, e))?;
    tmp.write_all(contents)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| UsbCertError::io(path, e))?;

    restrict_permissions(tmp.path(), mode);

    tmp.persist(path)
        .map_err(|e| UsbCertError::io(path, e.error))?;
    Ok(())
}

/// Best effort: logs instead of failing.
#[cfg(unix)]
fn restrict_permissions(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(err) = fs::set_permissions(path, fs::Permissions::from_mode(mode)) {
        warn!(path = %path.display(), mode = %format!("{mode:o}"), error = %err, "could not set file permissions");
    }
}

#[cfg(not(unix))]
fn restrict_permissions(path: &Path, _mode: u32) {
    debug!(path = %path.display(), "file permissions not adjusted on this platform");
}
