//! Resolved filesystem layout of an update.

use super::GlobalConfig;
use crate::core::UpdateError;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Absolute paths and swap sets for one update, derived once from
/// [`GlobalConfig`] and shared read-only by every component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateLayout {
    /// Live application root. Manifest files live directly under it.
    pub app_root: PathBuf,
    /// Package subdirectory name, relative to both the live root and the
    /// extracted archive root. Empty means the roots themselves.
    pub package_dir: PathBuf,
    /// Single-generation backup area.
    pub backup_dir: PathBuf,
    /// Staging area for the download and its extraction.
    pub staging_dir: PathBuf,
    /// Version marker file.
    pub version_file: PathBuf,
    /// Top-level manifest file names.
    pub manifest_files: Vec<String>,
    /// Replace folders, relative to the package directory.
    pub replace_folders: Vec<PathBuf>,
    /// Installer manifest, absolute.
    pub installer_manifest: PathBuf,
}

impl UpdateLayout {
    /// Resolve the layout against the current working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be determined.
    pub fn resolve(config: &GlobalConfig) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to determine current directory")?;
        Ok(Self::resolve_in(config, &cwd))
    }

    /// Resolve the layout against an explicit base directory.
    #[must_use]
    pub fn resolve_in(config: &GlobalConfig, base: &Path) -> Self {
        let app_root = join_expanded(base, &config.paths.app_root);

        Self {
            package_dir: PathBuf::from(config.paths.package_dir.trim_matches('/')),
            backup_dir: join_expanded(&app_root, &config.paths.backup_dir),
            staging_dir: join_expanded(&app_root, &config.paths.staging_dir),
            version_file: join_expanded(&app_root, &config.paths.version_file),
            manifest_files: config.upgrade.manifest_files.clone(),
            replace_folders: config.upgrade.replace_folders.iter().map(PathBuf::from).collect(),
            installer_manifest: app_root.join(&config.upgrade.installer_manifest),
            app_root,
        }
    }

    /// Live package directory holding the replace folders.
    #[must_use]
    pub fn live_package_dir(&self) -> PathBuf {
        self.app_root.join(&self.package_dir)
    }

    /// Directory the archive is extracted into.
    #[must_use]
    pub fn extract_dir(&self) -> PathBuf {
        self.staging_dir.join("extracted")
    }

    /// Reject layouts where the swap would carry away its own working areas.
    ///
    /// Live replace folders are moved into the backup area and the staging
    /// area is deleted after every run. Neither area may therefore sit inside
    /// or around a live replace folder, and they may not nest in each other.
    /// The staging area may not contain the application root.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::LayoutConflict`] naming the first overlap found.
    pub fn validate(&self) -> Result<(), UpdateError> {
        let live_package = self.live_package_dir();
        for (area, path) in [("staging", &self.staging_dir), ("backup", &self.backup_dir)] {
            for folder in &self.replace_folders {
                let live = live_package.join(folder);
                if overlaps(path, &live) {
                    return Err(conflict(area, path, &live));
                }
            }
        }

        if overlaps(&self.staging_dir, &self.backup_dir) {
            return Err(conflict("staging", &self.staging_dir, &self.backup_dir));
        }
        if self.app_root.starts_with(&self.staging_dir) {
            return Err(conflict("staging", &self.staging_dir, &self.app_root));
        }
        Ok(())
    }
}

fn overlaps(a: &Path, b: &Path) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

fn conflict(area: &'static str, path: &Path, other: &Path) -> UpdateError {
    UpdateError::LayoutConflict {
        area,
        path: path.to_path_buf(),
        conflict: other.to_path_buf(),
    }
}

fn join_expanded(base: &Path, raw: &str) -> PathBuf {
    let expanded = shellexpand::tilde(raw);
    let path = Path::new(expanded.as_ref());
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
