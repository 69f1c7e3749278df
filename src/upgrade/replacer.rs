use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::UpdateLayout;
use crate::constants::VERSION_MARKER_KEY;
use crate::core::{SwapStep, UpdateError};
use crate::upgrade::archive::ArchiveExtractor;
use crate::upgrade::models::{ArchiveKind, SwapReport, UpdatePhase};
use crate::utils::fs::{move_path, remove_path_if_exists};

/// Swaps the live application tree with the content of an update archive.
///
/// `FileTreeReplacer` runs the backup-then-swap sequence:
///
/// 1. **Manifest backup**: live manifest files move into the backup area
/// 2. **Manifest promotion**: manifests shipped by the archive move into the
///    live root
/// 3. **Folder backup-and-clear**: the previous backup of each replace folder
///    is deleted, then the live folder moves into the backup area
/// 4. **Folder promotion**: folders shipped by the archive move into the live
///    package directory
/// 5. **Cleanup**: the archive and the staging area are removed
/// 6. **Version commit**: the version marker is rewritten
///
/// # Failure Semantics
///
/// Extraction happens before step 1, so a broken archive never touches the
/// live tree. A filesystem error in steps 1 to 4 stops the swap and returns
/// [`UpdateError::PartialSwap`]; the version marker is left alone so it still
/// names the version the untouched files came from. Cleanup problems are only
/// logged. The staging area is removed on every exit path.
///
/// Every method is synchronous. Callers on the async runtime must run
/// [`replace`](Self::replace) on a blocking worker.
///
/// # Examples
///
/// ```rust,no_run
/// use autoupdate::config::{GlobalConfig, UpdateLayout};
/// use autoupdate::upgrade::FileTreeReplacer;
/// use autoupdate::upgrade::models::ArchiveKind;
/// use std::sync::Arc;
///
/// # fn example() -> anyhow::Result<()> {
/// let layout = Arc::new(UpdateLayout::resolve(&GlobalConfig::default())?);
/// let archive = layout.staging_dir.join("download_latest_file.tar.gz");
/// let report = FileTreeReplacer::new(layout).replace(&archive, ArchiveKind::TarGz, Some("v1.1.0"))?;
/// println!("Promoted {} folders", report.folders_promoted.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FileTreeReplacer {
    layout: Arc<UpdateLayout>,
}

impl FileTreeReplacer {
    /// Create a replacer operating on `layout`.
    #[must_use]
    pub const fn new(layout: Arc<UpdateLayout>) -> Self {
        Self {
            layout,
        }
    }

    /// Run the complete swap for `archive`.
    ///
    /// `new_version` is written to the marker after a successful swap. Pass
    /// `None` when the version is unknown; the marker is then left unchanged.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::LayoutConflict`] if the staging or backup area overlaps
    ///   a replace folder; nothing is touched, not even staging
    /// - [`UpdateError::ExtractionFailed`] or [`UpdateError::ArchiveMalformed`]
    ///   before any live file is touched
    /// - [`UpdateError::IoError`] if the backup area cannot be created
    /// - [`UpdateError::PartialSwap`] if a swap step or the version commit fails
    pub fn replace(
        &self,
        archive: &Path,
        kind: ArchiveKind,
        new_version: Option<&str>,
    ) -> Result<SwapReport, UpdateError> {
        self.replace_observed(archive, kind, new_version, |_| {})
    }

    /// [`replace`](Self::replace), reporting [`UpdatePhase::Extracting`] and
    /// [`UpdatePhase::Swapping`] to `observe` as each begins.
    ///
    /// # Errors
    ///
    /// Same as [`replace`](Self::replace).
    pub fn replace_observed(
        &self,
        archive: &Path,
        kind: ArchiveKind,
        new_version: Option<&str>,
        observe: impl Fn(UpdatePhase),
    ) -> Result<SwapReport, UpdateError> {
        self.layout.validate()?;
        let extract_dir = self.layout.extract_dir();
        observe(UpdatePhase::Extracting);

        let root = std::fs::create_dir_all(&self.layout.backup_dir)
            .map_err(UpdateError::from)
            .and_then(|()| ArchiveExtractor::extract_root(archive, kind, &extract_dir));
        let root = match root {
            Ok(root) => root,
            Err(e) => {
                self.cleanup(archive);
                return Err(e);
            }
        };

        observe(UpdatePhase::Swapping);
        let swapped = self.swap(&root);
        self.cleanup(archive);
        let mut report = swapped?;

        if let Some(version) = new_version {
            self.commit_version(version)?;
            report.committed_version = Some(version.to_string());
        }

        info!("File swap complete");
        Ok(report)
    }

    fn swap(&self, root: &Path) -> Result<SwapReport, UpdateError> {
        Ok(SwapReport {
            manifests_backed_up: self.backup_manifests()?,
            manifests_promoted: self.promote_manifests(root)?,
            folders_backed_up: self.backup_folders()?,
            folders_promoted: self.promote_folders(root)?,
            committed_version: None,
        })
    }

    /// Move each live manifest file into the backup area.
    ///
    /// An existing backup of the same name is overwritten. Missing live files
    /// are skipped. Returns the names that were moved.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::PartialSwap`] on any filesystem error.
    pub fn backup_manifests(&self) -> Result<Vec<String>, UpdateError> {
        let mut moved = Vec::new();
        for name in &self.layout.manifest_files {
            let live = self.layout.app_root.join(name);
            if !live.exists() {
                debug!("Manifest {} not present, nothing to back up", name);
                continue;
            }
            let backup = self.layout.backup_dir.join(name);
            move_path(&live, &backup).map_err(|e| partial(SwapStep::ManifestBackup, &live, e))?;
            debug!("Backed up {} to {}", name, backup.display());
            moved.push(name.clone());
        }
        Ok(moved)
    }

    /// Move each manifest file found at the top of `root` into the live root.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::PartialSwap`] on any filesystem error.
    pub fn promote_manifests(&self, root: &Path) -> Result<Vec<String>, UpdateError> {
        let mut moved = Vec::new();
        for name in &self.layout.manifest_files {
            let incoming = root.join(name);
            if !incoming.exists() {
                debug!("Archive ships no {}", name);
                continue;
            }
            let live = self.layout.app_root.join(name);
            move_path(&incoming, &live)
                .map_err(|e| partial(SwapStep::ManifestPromotion, &incoming, e))?;
            debug!("Promoted {}", name);
            moved.push(name.clone());
        }
        Ok(moved)
    }

    /// Replace the backup of each replace folder with the live folder.
    ///
    /// The previous backup generation is deleted first, so the backup area
    /// only ever holds the folders as they were before the latest swap. A live
    /// folder that does not exist is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::PartialSwap`] on any filesystem error.
    pub fn backup_folders(&self) -> Result<Vec<PathBuf>, UpdateError> {
        let live_package = self.layout.live_package_dir();
        let mut moved = Vec::new();
        for folder in &self.layout.replace_folders {
            let backup = self.layout.backup_dir.join(folder);
            if remove_path_if_exists(&backup)
                .map_err(|e| partial(SwapStep::FolderBackup, &backup, e))?
            {
                debug!("Removed previous backup {}", backup.display());
            }

            let live = live_package.join(folder);
            if !live.exists() {
                warn!("Replace folder {} does not exist, skipping backup", live.display());
                continue;
            }
            move_path(&live, &backup).map_err(|e| partial(SwapStep::FolderBackup, &live, e))?;
            debug!("Backed up {} to {}", live.display(), backup.display());
            moved.push(folder.clone());
        }
        Ok(moved)
    }

    /// Move each replace folder shipped under the package directory of `root`
    /// into the live package directory. Folders the archive lacks are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::PartialSwap`] on any filesystem error, or when
    /// `root` itself is gone, since every folder would then look absent.
    pub fn promote_folders(&self, root: &Path) -> Result<Vec<PathBuf>, UpdateError> {
        if !root.is_dir() {
            let missing = io::Error::new(
                io::ErrorKind::NotFound,
                "extracted archive root disappeared during the swap",
            );
            return Err(partial(SwapStep::FolderPromotion, root, missing));
        }
        let incoming_package = root.join(&self.layout.package_dir);
        let live_package = self.layout.live_package_dir();
        let mut moved = Vec::new();
        for folder in &self.layout.replace_folders {
            let incoming = incoming_package.join(folder);
            if !incoming.exists() {
                debug!("Archive ships no {}", folder.display());
                continue;
            }
            let live = live_package.join(folder);
            move_path(&incoming, &live)
                .map_err(|e| partial(SwapStep::FolderPromotion, &incoming, e))?;
            info!("Replaced {}", live.display());
            moved.push(folder.clone());
        }
        Ok(moved)
    }

    /// Remove the downloaded archive and the staging area.
    ///
    /// Failures are logged as warnings and never returned.
    pub fn cleanup(&self, archive: &Path) {
        let extract_dir = self.layout.extract_dir();
        for path in [archive, extract_dir.as_path(), self.layout.staging_dir.as_path()] {
            match remove_path_if_exists(path) {
                Ok(true) => debug!("Removed {}", path.display()),
                Ok(false) => {}
                Err(e) => warn!("Failed to clean up {}: {}", path.display(), e),
            }
        }
    }

    /// Overwrite the version marker with `version`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::PartialSwap`] with [`SwapStep::VersionCommit`]
    /// if the marker cannot be written.
    pub fn commit_version(&self, version: &str) -> Result<(), UpdateError> {
        let marker = &self.layout.version_file;
        let write = || -> io::Result<()> {
            if let Some(parent) = marker.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(marker, format!("{VERSION_MARKER_KEY}: {version}"))
        };
        write().map_err(|e| partial(SwapStep::VersionCommit, marker, e))?;
        info!("Version marker now reads {}", version);
        Ok(())
    }
}

fn partial(step: SwapStep, path: &Path, source: io::Error) -> UpdateError {
    UpdateError::PartialSwap {
        step,
        path: path.to_path_buf(),
        source,
    }
}
