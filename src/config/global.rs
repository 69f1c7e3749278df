//! Global configuration for the updater.
//!
//! The configuration file is TOML with three sections:
//!
//! - `[paths]`: where the live application, backups, staging area and the
//!   version marker live
//! - `[sources]`: release index, branch archive and branch version endpoints
//! - `[upgrade]`: swap sets and the dependency installer
//!   (see [`UpgradeConfig`])
//!
//! Every field has a default, so a missing file or an empty section is valid.
//!
//! # Location
//!
//! 1. The `--config` flag ([`GlobalConfig::load_with_optional`])
//! 2. The `AUTOUPDATE_CONFIG_PATH` environment variable
//! 3. `~/.autoupdate/config.toml`
//!
//! # Example
//!
//! ```toml
//! [paths]
//! app_root = "/srv/app"
//! package_dir = "app"
//! backup_dir = "backup"
//! staging_dir = "/tmp/autoupdate"
//!
//! [sources]
//! release_url = "https://api.github.com/repos/owner/app/releases/latest"
//! branch_version_url = "https://raw.githubusercontent.com/owner/app/{branch}/__version__"
//!
//! [upgrade]
//! replace_folders = ["plugins", "services"]
//! ```

use crate::constants::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::upgrade::config::UpgradeConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Environment variable that overrides the default configuration path.
pub const CONFIG_PATH_ENV: &str = "AUTOUPDATE_CONFIG_PATH";

/// Top-level configuration for the updater.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Filesystem locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Remote endpoints.
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Swap sets and installer settings.
    #[serde(default)]
    pub upgrade: UpgradeConfig,
}

/// Filesystem locations used by an update.
///
/// Relative paths resolve against `app_root`, which itself resolves against the
/// current directory. `~` is expanded in every entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the live application tree. Manifest files live here.
    #[serde(default = "default_app_root")]
    pub app_root: String,

    /// Package subdirectory holding the replace folders, under both the live
    /// root and the extracted archive root. Empty means the roots themselves.
    #[serde(default = "default_package_dir")]
    pub package_dir: String,

    /// Single-generation backup area.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,

    /// Staging area for the download and its extracted contents.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,

    /// Version marker file.
    #[serde(default = "default_version_file")]
    pub version_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            app_root: default_app_root(),
            package_dir: default_package_dir(),
            backup_dir: default_backup_dir(),
            staging_dir: default_staging_dir(),
            version_file: default_version_file(),
        }
    }
}

fn default_app_root() -> String {
    ".".to_string()
}

fn default_package_dir() -> String {
    "app".to_string()
}

fn default_backup_dir() -> String {
    "backup".to_string()
}

fn default_staging_dir() -> String {
    ".autoupdate".to_string()
}

fn default_version_file() -> String {
    "__version__".to_string()
}

/// Remote endpoints queried during an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Release index returning JSON with `name`, `created_at`, `body` and
    /// `tarball_url`.
    #[serde(default = "default_release_url")]
    pub release_url: String,

    /// Zip snapshot of the main branch.
    #[serde(default = "default_main_archive_url")]
    pub main_archive_url: String,

    /// Zip snapshot of the dev branch.
    #[serde(default = "default_dev_archive_url")]
    pub dev_archive_url: String,

    /// Raw version file of a branch. `{branch}` is replaced by the branch name.
    #[serde(default = "default_branch_version_url")]
    pub branch_version_url: String,

    /// `User-Agent` sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            release_url: default_release_url(),
            main_archive_url: default_main_archive_url(),
            dev_archive_url: default_dev_archive_url(),
            branch_version_url: default_branch_version_url(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl SourcesConfig {
    /// URL of the raw version file for `branch`.
    #[must_use]
    pub fn branch_version_url_for(&self, branch: &str) -> String {
        self.branch_version_url.replace("{branch}", branch)
    }
}

fn default_release_url() -> String {
    "https://api.github.com/repos/owner/app/releases/latest".to_string()
}

fn default_main_archive_url() -> String {
    "https://github.com/owner/app/archive/refs/heads/main.zip".to_string()
}

fn default_dev_archive_url() -> String {
    "https://github.com/owner/app/archive/refs/heads/dev.zip".to_string()
}

fn default_branch_version_url() -> String {
    "https://raw.githubusercontent.com/owner/app/{branch}/__version__".to_string()
}

fn default_user_agent() -> String {
    format!("autoupdate/{}", env!("CARGO_PKG_VERSION"))
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl GlobalConfig {
    /// Load configuration from the default location.
    ///
    /// Returns the default configuration when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined, or the file
    /// exists but cannot be read or parsed.
    pub async fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit path, falling back to the default
    /// location when `path` is `None`.
    ///
    /// A missing file yields the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        if path.exists() {
            Self::load_from(&path).await
        } else {
            tracing::debug!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Save configuration to a specific file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written, or
    /// serialization fails.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Default configuration path.
    ///
    /// `AUTOUPDATE_CONFIG_PATH` wins when set. Otherwise the file is
    /// `~/.autoupdate/config.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV)
            && !path.is_empty()
        {
            return Ok(PathBuf::from(path));
        }

        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?;
        Ok(home.join(".autoupdate").join("config.toml"))
    }
}
