//! Common filesystem utilities
//!
//! Shared operations used by package export and spool management.

use std::path::{Path, PathBuf};

/// Ensure a file's parent directory exists.
///
/// Creates the parent directory (and all ancestors) if it doesn't exist.
pub(crate) fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Absolute form of a path, resolving symlinks when the path exists.
///
/// Falls back to prefixing the current directory for paths that don't
/// exist yet (a destination about to be created, for example).
pub(crate) fn absolutize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}

/// Relocate `src` to `dest`, either moving or copying.
///
/// Moves fall back to copy-then-remove when a plain rename fails, so a
/// destination on another filesystem still works.
pub(crate) fn relocate(src: &Path, dest: &Path, move_source: bool) -> std::io::Result<()> {
    ensure_parent_dir(dest)?;
    if move_source {
        if std::fs::rename(src, dest).is_ok() {
            return Ok(());
        }
        std::fs::copy(src, dest)?;
        std::fs::remove_file(src)?;
    } else {
        std::fs::copy(src, dest)?;
    }
    Ok(())
}

/// Set file permissions (Unix only).
///
/// No-op on non-Unix platforms.
#[cfg(unix)]
pub(crate) fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
pub(crate) fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
