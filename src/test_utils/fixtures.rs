//! Archive and application-tree fixtures.

use crate::config::{GlobalConfig, UpdateLayout};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Installer name guaranteed not to exist, so tests never run a real one.
pub const MISSING_INSTALLER: &str = "autoupdate-test-missing-installer";

/// Build a tar-gzip archive in memory from `(path, content)` pairs.
///
/// Parent directories are implied by the file paths.
#[must_use]
pub fn tar_gz_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        builder.append_data(&mut header, path, content.as_bytes()).expect("append tar entry");
    }
    builder.into_inner().expect("finish tar").finish().expect("finish gzip")
}

/// Build a zip archive in memory from `(path, content)` pairs.
#[must_use]
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (path, content) in entries {
        writer.start_file(*path, options).expect("start zip entry");
        writer.write_all(content.as_bytes()).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Write a tar-gzip archive to `path`.
pub fn write_tar_gz(path: &Path, entries: &[(&str, &str)]) {
    std::fs::write(path, tar_gz_bytes(entries)).expect("write tar.gz fixture");
}

/// Write a zip archive to `path`.
pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    std::fs::write(path, zip_bytes(entries)).expect("write zip fixture");
}

/// A temporary application tree with its resolved layout.
///
/// Layout inside the temp dir:
///
/// ```text
/// live/            app root (manifests, __version__)
/// live/app/        package directory (replace folders)
/// live/backup/     backup area
/// staging/         staging area, outside the live tree
/// ```
///
/// The installer is set to a program that does not exist.
pub struct TestLayout {
    pub temp: TempDir,
    pub config: GlobalConfig,
    pub layout: UpdateLayout,
}

impl TestLayout {
    /// Create a tree whose replace folders are `replace_folders`.
    #[must_use]
    pub fn new(replace_folders: &[&str]) -> Self {
        let temp = TempDir::new().expect("create temp dir");
        let live = temp.path().join("live");
        std::fs::create_dir_all(&live).expect("create live root");

        let mut config = GlobalConfig::default();
        config.paths.app_root = live.display().to_string();
        config.paths.package_dir = "app".to_string();
        config.paths.backup_dir = "backup".to_string();
        config.paths.staging_dir = temp.path().join("staging").display().to_string();
        config.upgrade.replace_folders = replace_folders.iter().map(|f| (*f).to_string()).collect();
        config.upgrade.installer_program = MISSING_INSTALLER.to_string();
        config.sources.request_timeout_secs = 5;

        let layout = UpdateLayout::resolve_in(&config, temp.path());
        Self {
            temp,
            config,
            layout,
        }
    }

    /// Point every remote endpoint at `base_url` (a mock server).
    ///
    /// - `{base}/releases/latest`
    /// - `{base}/archive/main.zip`, `{base}/archive/dev.zip`
    /// - `{base}/raw/{branch}/__version__`
    #[must_use]
    pub fn with_mock_sources(mut self, base_url: &str) -> Self {
        self.config.sources.release_url = format!("{base_url}/releases/latest");
        self.config.sources.main_archive_url = format!("{base_url}/archive/main.zip");
        self.config.sources.dev_archive_url = format!("{base_url}/archive/dev.zip");
        self.config.sources.branch_version_url = format!("{base_url}/raw/{{branch}}/__version__");
        self
    }

    /// Layout behind an `Arc`, as components take it.
    #[must_use]
    pub fn shared(&self) -> Arc<UpdateLayout> {
        Arc::new(self.layout.clone())
    }

    /// Write `content` at `relative` under the live root, creating parents.
    pub fn write_live(&self, relative: &str, content: &str) {
        let path = self.layout.app_root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(path, content).expect("write live file");
    }

    /// Read `relative` under the live root, `None` if absent.
    #[must_use]
    pub fn read_live(&self, relative: &str) -> Option<String> {
        std::fs::read_to_string(self.layout.app_root.join(relative)).ok()
    }

    /// Read `relative` under the backup area, `None` if absent.
    #[must_use]
    pub fn read_backup(&self, relative: &str) -> Option<String> {
        std::fs::read_to_string(self.layout.backup_dir.join(relative)).ok()
    }

    /// Write the version marker.
    pub fn write_marker(&self, version: &str) {
        std::fs::write(&self.layout.version_file, format!("__version__: {version}"))
            .expect("write version marker");
    }

    /// Raw content of the version marker, `None` if absent.
    #[must_use]
    pub fn marker(&self) -> Option<String> {
        std::fs::read_to_string(&self.layout.version_file).ok()
    }
}
