//! Archive extraction for downloaded update artifacts.
//!
//! Releases ship as gzip-compressed tarballs, branch snapshots as zip. Both
//! are unpacked entry by entry into the staging area, and any entry whose path
//! would land outside the extraction target fails the whole extraction.
//!
//! Upstream archives wrap their content in a single top-level directory
//! (`owner-app-1a2b3c/`). [`ArchiveExtractor::locate_root`] finds it so the
//! swap can address files relative to the real project root.

use flate2::read::GzDecoder;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::UpdateError;
use crate::upgrade::models::{ArchiveKind, ArchiveRoot};

/// Unpacks update archives and locates their top-level directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    /// Extract `archive` of `kind` into `target_dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::ExtractionFailed`] when the archive cannot be
    /// opened or decoded, or an entry escapes `target_dir`.
    pub fn extract(archive: &Path, kind: ArchiveKind, target_dir: &Path) -> Result<(), UpdateError> {
        let failed = |reason: String| UpdateError::ExtractionFailed {
            path: archive.to_path_buf(),
            reason,
        };

        std::fs::create_dir_all(target_dir).map_err(|e| failed(e.to_string()))?;
        let file = File::open(archive).map_err(|e| failed(e.to_string()))?;

        let count = match kind {
            ArchiveKind::TarGz => Self::extract_tar_gz(file, target_dir),
            ArchiveKind::Zip => Self::extract_zip(file, target_dir),
        }
        .map_err(|e| failed(e.to_string()))?;

        info!("Extracted {} entries from {}", count, archive.display());
        Ok(())
    }

    fn extract_tar_gz(file: File, target_dir: &Path) -> io::Result<usize> {
        let mut archive = tar::Archive::new(GzDecoder::new(file));
        let mut count = 0;
        for entry in archive.entries()? {
            let mut entry = entry?;
            let path = entry.path()?.into_owned();
            // unpack_in refuses paths with `..` or absolute roots and reports
            // it by returning false.
            if !entry.unpack_in(target_dir)? {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("entry {} escapes the extraction directory", path.display()),
                ));
            }
            count += 1;
        }
        Ok(count)
    }

    fn extract_zip(file: File, target_dir: &Path) -> io::Result<usize> {
        let mut archive = zip::ZipArchive::new(file).map_err(io::Error::other)?;
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(io::Error::other)?;
            let Some(relative) = entry.enclosed_name() else {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("entry {} escapes the extraction directory", entry.name()),
                ));
            };
            let out_path = target_dir.join(relative);

            if entry.is_dir() {
                std::fs::create_dir_all(&out_path)?;
            } else {
                if let Some(parent) = out_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let mut outfile = File::create(&out_path)?;
                io::copy(&mut entry, &mut outfile)?;
            }
        }
        Ok(archive.len())
    }

    /// Find the top-level directory of an extracted archive.
    ///
    /// Returns the first directory entry of `target_dir` in name order, or
    /// [`ArchiveRoot::Malformed`] when there is none (or `target_dir` cannot be
    /// read).
    #[must_use]
    pub fn locate_root(target_dir: &Path) -> ArchiveRoot {
        let Ok(entries) = std::fs::read_dir(target_dir) else {
            return ArchiveRoot::Malformed;
        };

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
            .map(|entry| entry.path())
            .collect();
        dirs.sort();

        match dirs.into_iter().next() {
            Some(root) => {
                debug!("Archive root is {}", root.display());
                ArchiveRoot::Root(root)
            }
            None => ArchiveRoot::Malformed,
        }
    }

    /// Extract `archive` and return its top-level directory.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::ExtractionFailed`] from [`Self::extract`], or
    /// [`UpdateError::ArchiveMalformed`] when no top-level directory exists.
    pub fn extract_root(
        archive: &Path,
        kind: ArchiveKind,
        target_dir: &Path,
    ) -> Result<PathBuf, UpdateError> {
        Self::extract(archive, kind, target_dir)?;
        match Self::locate_root(target_dir) {
            ArchiveRoot::Root(root) => Ok(root),
            ArchiveRoot::Malformed => Err(UpdateError::ArchiveMalformed {
                path: archive.to_path_buf(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::{write_tar_gz, write_zip};
    use tempfile::TempDir;

    #[test]
    fn test_extract_tar_gz_root() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("a.tar.gz");
        write_tar_gz(
            &archive,
            &[("app-1.1.0/requirements.txt", "new"), ("app-1.1.0/app/plugins/p.py", "p")],
        );

        let out = temp.path().join("out");
        let root = ArchiveExtractor::extract_root(&archive, ArchiveKind::TarGz, &out).unwrap();
        assert_eq!(root, out.join("app-1.1.0"));
        assert_eq!(std::fs::read_to_string(root.join("app/plugins/p.py")).unwrap(), "p");
    }

    #[test]
    fn test_extract_zip_root() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("a.zip");
        write_zip(&archive, &[("app-main/requirements.txt", "z"), ("app-main/app/x.txt", "x")]);

        let out = temp.path().join("out");
        let root = ArchiveExtractor::extract_root(&archive, ArchiveKind::Zip, &out).unwrap();
        assert_eq!(root, out.join("app-main"));
        assert!(root.join("app/x.txt").exists());
    }

    #[test]
    fn test_locate_root_picks_first_by_name() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("b-dir")).unwrap();
        std::fs::create_dir_all(temp.path().join("a-dir")).unwrap();
        std::fs::write(temp.path().join("0-file"), "f").unwrap();

        assert_eq!(
            ArchiveExtractor::locate_root(temp.path()),
            ArchiveRoot::Root(temp.path().join("a-dir"))
        );
    }

    #[test]
    fn test_flat_archive_is_malformed() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("flat.zip");
        write_zip(&archive, &[("requirements.txt", "x")]);

        let err = ArchiveExtractor::extract_root(&archive, ArchiveKind::Zip, &temp.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, UpdateError::ArchiveMalformed { .. }));
    }

    #[test]
    fn test_zip_entry_escaping_target_is_rejected() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("evil.zip");
        write_zip(&archive, &[("root/ok.txt", "ok"), ("../escaped.txt", "evil")]);

        let out = temp.path().join("nested").join("out");
        let err = ArchiveExtractor::extract(&archive, ArchiveKind::Zip, &out).unwrap_err();
        assert!(matches!(err, UpdateError::ExtractionFailed { .. }));
        assert!(!temp.path().join("nested").join("escaped.txt").exists());
    }

    #[test]
    fn test_corrupt_archive_fails_extraction() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("bad.tar.gz");
        std::fs::write(&archive, b"definitely not gzip").unwrap();

        let err = ArchiveExtractor::extract(&archive, ArchiveKind::TarGz, &temp.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, UpdateError::ExtractionFailed { .. }));
    }
}
