use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};
use tokio_retry::Retry;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::{debug, info, warn};

use crate::config::{SourcesConfig, UpdateLayout};
use crate::constants::{MAX_BACKOFF_DELAY_MS, SENTINEL_VERSION, STARTING_BACKOFF_DELAY_MS};
use crate::core::UpdateError;
use crate::upgrade::models::ReleaseMetadata;

/// Resolves the installed version and the versions published upstream.
///
/// `VersionChecker` reads the local version marker and queries two remote
/// endpoints:
///
/// - the **release index**, returning JSON [`ReleaseMetadata`] for the latest
///   tagged release
/// - the **branch version file**, returning the raw marker of a branch
///   (`__version__: v1.2.3-abc1234`)
///
/// # Retry Policy
///
/// Only the release index query retries. Transport errors and non-200 statuses
/// are retried with exponential backoff up to the configured number of
/// attempts. A 200 response with a body that is not valid metadata ends the
/// query immediately: a malformed answer will not fix itself on retry.
///
/// The branch version query never retries. Any failure reports the version as
/// unknown (`None`).
///
/// # Examples
///
/// ```rust,no_run
/// use autoupdate::upgrade::VersionChecker;
///
/// # async fn example(checker: VersionChecker) {
/// let current = checker.current_version().await;
/// if let Some(meta) = checker.latest_release_metadata().await {
///     println!("{}", VersionChecker::format_version_info(&current, Some(&meta.name)));
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct VersionChecker {
    client: Client,
    sources: SourcesConfig,
    version_file: PathBuf,
    metadata_attempts: usize,
}

impl VersionChecker {
    /// Create a checker for the marker in `layout`, querying `sources`.
    ///
    /// `metadata_attempts` is clamped to at least one attempt.
    #[must_use]
    pub fn new(
        client: Client,
        sources: SourcesConfig,
        layout: &UpdateLayout,
        metadata_attempts: usize,
    ) -> Self {
        Self {
            client,
            sources,
            version_file: layout.version_file.clone(),
            metadata_attempts: metadata_attempts.max(1),
        }
    }

    /// Path of the version marker this checker reads.
    #[must_use]
    pub fn version_file(&self) -> &Path {
        &self.version_file
    }

    /// Read the installed version from the version marker.
    ///
    /// Takes the first line of the marker and returns the text after its last
    /// `:`, trimmed. Returns `v0.0.0` when the marker is missing, unreadable or
    /// empty. Never fails.
    pub async fn current_version(&self) -> String {
        match tokio::fs::read_to_string(&self.version_file).await {
            Ok(content) => {
                let first_line = content.lines().next().unwrap_or_default();
                let version = Self::strip_version_prefix(first_line);
                if version.is_empty() {
                    debug!("Version marker {} is empty", self.version_file.display());
                    SENTINEL_VERSION.to_string()
                } else {
                    version
                }
            }
            Err(e) => {
                debug!("Cannot read version marker {}: {}", self.version_file.display(), e);
                SENTINEL_VERSION.to_string()
            }
        }
    }

    /// Fetch metadata of the latest release.
    ///
    /// Returns `None` when every attempt failed or the index answered with a
    /// body that is not release metadata.
    pub async fn latest_release_metadata(&self) -> Option<ReleaseMetadata> {
        let url = self.sources.release_url.as_str();
        let strategy = ExponentialBackoff::from_millis(STARTING_BACKOFF_DELAY_MS)
            .max_delay(std::time::Duration::from_millis(MAX_BACKOFF_DELAY_MS))
            .take(self.metadata_attempts - 1);

        let mut attempt = 0usize;
        let result = Retry::spawn(strategy, || {
            attempt += 1;
            let current_attempt = attempt;
            async move {
                debug!("Fetching release metadata from {} (attempt {})", url, current_attempt);
                self.fetch_metadata_once(url).await.inspect_err(|e| {
                    warn!("Release metadata attempt {} failed: {}", current_attempt, e);
                })
            }
        })
        .await;

        match result {
            Ok(Some(meta)) => {
                info!("Latest release: {}", meta.name);
                Some(meta)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Giving up on release metadata after {} attempts: {}", self.metadata_attempts, e);
                None
            }
        }
    }

    /// One metadata request. `Err` is retried, `Ok(None)` is final.
    async fn fetch_metadata_once(&self, url: &str) -> Result<Option<ReleaseMetadata>, UpdateError> {
        let response = self.client.get(url).send().await.map_err(|e| UpdateError::Network {
            operation: "release metadata".to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(UpdateError::Network {
                operation: "release metadata".to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        let body = response.bytes().await.map_err(|e| UpdateError::Network {
            operation: "release metadata".to_string(),
            reason: e.to_string(),
        })?;

        match serde_json::from_slice::<ReleaseMetadata>(&body) {
            Ok(meta) => Ok(Some(meta)),
            Err(e) => {
                warn!("Release index returned unparseable metadata: {}", e);
                Ok(None)
            }
        }
    }

    /// Fetch the raw version file of `branch`.
    ///
    /// Returns the trimmed body on HTTP 200, `None` otherwise. The body still
    /// carries its `__version__:` prefix; see [`Self::strip_version_prefix`].
    pub async fn branch_version(&self, branch: &str) -> Option<String> {
        let url = self.sources.branch_version_url_for(branch);
        debug!("Fetching {} branch version from {}", branch, url);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to fetch {} branch version: {}", branch, e);
                return None;
            }
        };

        if response.status() != StatusCode::OK {
            warn!("Branch version endpoint returned HTTP {}", response.status());
            return None;
        }

        match response.text().await {
            Ok(text) => Some(text.trim().to_string()),
            Err(e) => {
                warn!("Failed to read {} branch version body: {}", branch, e);
                None
            }
        }
    }

    /// Strip a `key:` prefix from a version marker line.
    ///
    /// Returns the text after the last `:`, trimmed. A line without a colon is
    /// returned trimmed.
    ///
    /// ```rust
    /// use autoupdate::upgrade::VersionChecker;
    ///
    /// assert_eq!(VersionChecker::strip_version_prefix("__version__: v1.2.3"), "v1.2.3");
    /// assert_eq!(VersionChecker::strip_version_prefix(" v2.0.0 "), "v2.0.0");
    /// ```
    #[must_use]
    pub fn strip_version_prefix(raw: &str) -> String {
        raw.rsplit(':').next().unwrap_or(raw).trim().to_string()
    }

    /// Whether `latest` is newer than `current`.
    ///
    /// Compares as semver when both parse after stripping a leading `v`,
    /// otherwise any difference counts as an update.
    #[must_use]
    pub fn is_update_available(current: &str, latest: &str) -> bool {
        let parse = |v: &str| semver::Version::parse(v.trim().trim_start_matches('v')).ok();
        match (parse(current), parse(latest)) {
            (Some(c), Some(l)) => l > c,
            _ => current.trim() != latest.trim(),
        }
    }

    /// Format version information for display.
    #[must_use]
    pub fn format_version_info(current: &str, latest: Option<&str>) -> String {
        match latest {
            Some(v) if Self::is_update_available(current, v) => {
                format!("Current version: {current}\nLatest version:  {v} (update available)")
            }
            _ => format!("Current version: {current} (up to date)"),
        }
    }
}
