//! Global constants used throughout the updater.
//!
//! Timeouts, retry parameters and the fixed file names of the staging area.
//! Defining them centrally keeps magic numbers discoverable.

/// Version reported when the version marker is missing or empty.
pub const SENTINEL_VERSION: &str = "v0.0.0";

/// Key written in front of the version token in the version-marker file.
///
/// The marker holds a single line of the form `__version__: v1.2.3`.
pub const VERSION_MARKER_KEY: &str = "__version__";

/// Maximum number of attempts for the release metadata query.
pub const DEFAULT_METADATA_ATTEMPTS: usize = 3;

/// Starting delay for exponential backoff between metadata attempts (10ms).
pub const STARTING_BACKOFF_DELAY_MS: u64 = 10;

/// Maximum backoff delay between metadata attempts (500ms).
pub const MAX_BACKOFF_DELAY_MS: u64 = 500;

/// Default timeout for a single HTTP request (30 seconds).
///
/// Applies to metadata, branch version and redirect probes. Archive downloads
/// are streamed and use the same client.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default timeout for the external dependency installer (10 minutes).
pub const DEFAULT_INSTALLER_TIMEOUT_SECS: u64 = 600;

/// File name of a downloaded release tarball inside the staging area.
pub const DOWNLOAD_GZ_FILE: &str = "download_latest_file.tar.gz";

/// File name of a downloaded branch snapshot inside the staging area.
pub const DOWNLOAD_ZIP_FILE: &str = "download_latest_file.zip";
