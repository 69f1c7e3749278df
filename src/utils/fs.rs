//! File system helpers used by the file-tree swap.
//!
//! All functions here are synchronous and return [`std::io::Result`] so callers
//! can attach the failing path and swap step to the raw I/O error. They are
//! meant to run on a blocking worker, never directly on the async runtime.
//!
//! # Moves across filesystems
//!
//! [`move_path`] tries `rename` first. The staging area may sit on another
//! mount than the live tree (for example a tmpfs), in which case `rename`
//! fails with [`ErrorKind::CrossesDevices`]. The move then falls back to a
//! recursive copy followed by removal of the source.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;
use walkdir::WalkDir;

/// Move a file or directory from `src` to `dst`.
///
/// Parent directories of `dst` are created. An existing file at `dst` is
/// replaced. An existing directory at `dst` is removed first, so the result
/// is exactly the source tree.
///
/// # Errors
///
/// Returns the underlying I/O error when the source is missing, the
/// destination cannot be cleared, or the move itself fails.
///
/// # Examples
///
/// ```rust,no_run
/// use autoupdate::utils::fs::move_path;
/// use std::path::Path;
///
/// # fn example() -> std::io::Result<()> {
/// move_path(Path::new("staging/plugins"), Path::new("app/plugins"))?;
/// # Ok(())
/// # }
/// ```
pub fn move_path(src: &Path, dst: &Path) -> io::Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    remove_path_if_exists(dst)?;

    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {
            tracing::debug!(
                "Cross-device move {} -> {}, copying instead",
                src.display(),
                dst.display()
            );
            copy_tree(src, dst)?;
            remove_path(src)
        }
        Err(e) => Err(e),
    }
}

/// Recursively copy `src` to `dst`. Symlinks are copied as the files they
/// point to.
///
/// # Errors
///
/// Returns the first I/O error encountered while walking or copying.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    if src.is_file() {
        fs::copy(src, dst)?;
        return Ok(());
    }

    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry.path().strip_prefix(src).map_err(io::Error::other)?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Remove a file or directory tree.
///
/// # Errors
///
/// Returns the I/O error, including [`ErrorKind::NotFound`] when `path` is
/// absent.
pub fn remove_path(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Remove a file or directory tree, treating absence as success.
///
/// Returns whether something was removed.
///
/// # Errors
///
/// Returns the I/O error for any failure other than the path being absent.
pub fn remove_path_if_exists(path: &Path) -> io::Result<bool> {
    match remove_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_move_file_replaces_existing() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("new.txt");
        let dst = temp.path().join("out").join("file.txt");
        fs::write(&src, "new").unwrap();
        fs::create_dir_all(dst.parent().unwrap()).unwrap();
        fs::write(&dst, "old").unwrap();

        move_path(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dst).unwrap(), "new");
    }

    #[test]
    fn test_move_dir_replaces_whole_tree() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("nested").join("a.txt"), "a").unwrap();
        fs::create_dir_all(&dst).unwrap();
        fs::write(dst.join("stale.txt"), "stale").unwrap();

        move_path(&src, &dst).unwrap();

        assert!(!src.exists());
        assert!(dst.join("nested").join("a.txt").exists());
        assert!(!dst.join("stale.txt").exists());
    }

    #[test]
    fn test_move_missing_source_is_not_found() {
        let temp = TempDir::new().unwrap();
        let err = move_path(&temp.path().join("nope"), &temp.path().join("dst")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_copy_tree() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("a").join("b")).unwrap();
        fs::write(src.join("a").join("b").join("c.txt"), "c").unwrap();
        fs::write(src.join("top.txt"), "top").unwrap();

        let dst = temp.path().join("dst");
        copy_tree(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(dst.join("a").join("b").join("c.txt")).unwrap(), "c");
        assert_eq!(fs::read_to_string(dst.join("top.txt")).unwrap(), "top");
        assert!(src.exists());
    }

    #[test]
    fn test_remove_path_if_exists() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("dir");
        fs::create_dir_all(dir.join("inner")).unwrap();

        assert!(remove_path_if_exists(&dir).unwrap());
        assert!(!dir.exists());
        assert!(!remove_path_if_exists(&dir).unwrap());
    }
}
