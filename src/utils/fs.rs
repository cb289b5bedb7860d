//! File system utilities.

use std::io;
use std::path::{Path, PathBuf};

/// Move a file, creating the destination directory when missing.
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            tracing::info!("Creating folder because it doesn't exist ({})", parent.display());
            std::fs::create_dir_all(parent)?;
        }
    }

    // Try rename first (fast, same filesystem)
    match std::fs::rename(from, to) {
        Ok(()) => return Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::debug!("Cross-filesystem move detected, using copy+delete");
        }
        Err(e) => return Err(e),
    }

    // Fall back to copy + delete (cross filesystem)
    std::fs::copy(from, to)?;
    if let Err(e) = std::fs::remove_file(from) {
        let _ = std::fs::remove_file(to);
        return Err(e);
    }
    Ok(())
}

/// Remove a directory if it has no entries left.
pub fn remove_if_empty(dir: &Path) -> io::Result<bool> {
    if std::fs::read_dir(dir)?.next().is_some() {
        return Ok(false);
    }
    std::fs::remove_dir(dir)?;
    Ok(true)
}

/// Extension of a path including the leading dot, or an empty string.
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}

/// Same path with its extension replaced by `ext` (given without dot).
pub fn sidecar_path(path: &Path, ext: &str) -> PathBuf {
    path.with_extension(ext.trim_start_matches('.'))
}

/// Number of characters in a path, as counted for the length budget.
pub fn path_length(path: &Path) -> usize {
    path.to_string_lossy().chars().count()
}
