use crate::constants::{DEFAULT_INSTALLER_TIMEOUT_SECS, DEFAULT_METADATA_ATTEMPTS};
use serde::{Deserialize, Serialize};

/// Configuration for the file swap and post-update steps.
///
/// `UpgradeConfig` lists what gets swapped during an update and how the
/// dependency installer is invoked afterwards. It lives in the `[upgrade]`
/// section of the configuration file.
///
/// # Swap Sets
///
/// - **Manifest files**: top-level files such as `requirements.txt`. Each is
///   backed up, then replaced when the new archive ships it.
/// - **Replace folders**: directories relative to the package directory that
///   are swapped whole. The previous copy is kept as a single-generation backup.
///
/// Both sets are fixed configuration. Nothing is discovered at runtime.
///
/// # Examples
///
/// ```rust,no_run
/// use autoupdate::upgrade::config::UpgradeConfig;
///
/// let config = UpgradeConfig::default();
/// assert_eq!(config.metadata_attempts, 3);
/// assert!(config.manifest_files.contains(&"requirements.txt".to_string()));
/// ```
///
/// ## TOML Example
/// ```toml
/// [upgrade]
/// manifest_files = ["pyproject.toml", "poetry.lock", "requirements.txt"]
/// replace_folders = ["plugins", "services"]
/// installer_program = "pip"
/// installer_args = ["install", "-r", "{manifest}"]
/// installer_manifest = "requirements.txt"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeConfig {
    /// Top-level files backed up and replaced on every update.
    ///
    /// # Default: `["pyproject.toml", "poetry.lock", "requirements.txt"]`
    #[serde(default = "default_manifest_files")]
    pub manifest_files: Vec<String>,

    /// Folders, relative to the package directory, swapped whole on update.
    ///
    /// # Default: `["builtin_plugins", "services", "utils", "models", "configs"]`
    #[serde(default = "default_replace_folders")]
    pub replace_folders: Vec<String>,

    /// Maximum attempts for the release metadata query.
    ///
    /// # Default: `3`
    #[serde(default = "default_metadata_attempts")]
    pub metadata_attempts: usize,

    /// Program that installs dependencies after the swap.
    ///
    /// Resolved on `PATH` with `which`. When it cannot be found the update still
    /// succeeds and an error is logged.
    ///
    /// # Default: `"pip"`
    #[serde(default = "default_installer_program")]
    pub installer_program: String,

    /// Arguments passed to the installer. `{manifest}` is replaced by the
    /// absolute path of [`installer_manifest`](Self::installer_manifest).
    ///
    /// # Default: `["install", "-r", "{manifest}"]`
    #[serde(default = "default_installer_args")]
    pub installer_args: Vec<String>,

    /// Manifest the installer reads, relative to the application root.
    ///
    /// Reconciliation is skipped when this file does not exist.
    ///
    /// # Default: `"requirements.txt"`
    #[serde(default = "default_installer_manifest")]
    pub installer_manifest: String,

    /// Timeout in seconds for the installer process.
    ///
    /// # Default: `600`
    #[serde(default = "default_installer_timeout_secs")]
    pub installer_timeout_secs: u64,

    /// Recipient of the "update starting" notification.
    ///
    /// # Default: `"admin"`
    #[serde(default = "default_notify_recipient")]
    pub notify_recipient: String,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            manifest_files: default_manifest_files(),
            replace_folders: default_replace_folders(),
            metadata_attempts: default_metadata_attempts(),
            installer_program: default_installer_program(),
            installer_args: default_installer_args(),
            installer_manifest: default_installer_manifest(),
            installer_timeout_secs: default_installer_timeout_secs(),
            notify_recipient: default_notify_recipient(),
        }
    }
}

fn default_manifest_files() -> Vec<String> {
    ["pyproject.toml", "poetry.lock", "requirements.txt"].map(String::from).to_vec()
}

fn default_replace_folders() -> Vec<String> {
    ["builtin_plugins", "services", "utils", "models", "configs"].map(String::from).to_vec()
}

const fn default_metadata_attempts() -> usize {
    DEFAULT_METADATA_ATTEMPTS
}

fn default_installer_program() -> String {
    "pip".to_string()
}

fn default_installer_args() -> Vec<String> {
    ["install", "-r", "{manifest}"].map(String::from).to_vec()
}

fn default_installer_manifest() -> String {
    "requirements.txt".to_string()
}

const fn default_installer_timeout_secs() -> u64 {
    DEFAULT_INSTALLER_TIMEOUT_SECS
}

fn default_notify_recipient() -> String {
    "admin".to_string()
}
