use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

use crate::config::{GlobalConfig, UpdateLayout};
use crate::core::UpdateError;
use crate::upgrade::fetcher::{ArtifactFetcher, build_http_client};
use crate::upgrade::models::{Channel, ReleaseMetadata, UpdatePhase};
use crate::upgrade::notify::Notifier;
use crate::upgrade::reconcile::DependencyReconciler;
use crate::upgrade::replacer::FileTreeReplacer;
use crate::upgrade::version_check::VersionChecker;

/// Version shown in messages when a branch version cannot be fetched.
const UNKNOWN_VERSION: &str = "unknown";

/// Orchestrates a complete self-update of the host application.
///
/// `SelfUpdater` wires the update components together and runs them in order:
/// version resolution, download target resolution, notification, download,
/// extraction and file swap, then dependency installation.
///
/// # Concurrency
///
/// Only one update runs at a time. [`perform_update`](Self::perform_update)
/// takes an internal lock with `try_lock`; a second caller gets
/// [`UpdateError::UpdateInProgress`] immediately instead of queueing. Nothing
/// is cancellable once started.
///
/// The file swap is blocking filesystem work and runs on
/// [`tokio::task::spawn_blocking`].
///
/// # Progress
///
/// The current [`UpdatePhase`] is published on a watch channel. Use
/// [`subscribe`](Self::subscribe) to follow a run.
///
/// # Examples
///
/// ```rust,no_run
/// use autoupdate::config::GlobalConfig;
/// use autoupdate::upgrade::{Channel, LogNotifier, SelfUpdater};
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = GlobalConfig::load().await?;
/// let updater = SelfUpdater::from_config(&config, Arc::new(LogNotifier))?;
///
/// println!("{}", updater.check_version().await);
///
/// match updater.perform_update(Channel::Release, "admin").await {
///     Ok(message) => println!("{message}"),
///     Err(e) => eprintln!("Update failed: {e}"),
/// }
/// # Ok(())
/// # }
/// ```
pub struct SelfUpdater {
    layout: Arc<UpdateLayout>,
    checker: VersionChecker,
    fetcher: ArtifactFetcher,
    reconciler: DependencyReconciler,
    notifier: Arc<dyn Notifier>,
    guard: Mutex<()>,
    phase: Arc<watch::Sender<UpdatePhase>>,
}

impl SelfUpdater {
    /// Create an updater for an already resolved layout.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::LayoutConflict`] if the staging or backup area
    /// overlaps a replace folder, or [`UpdateError::Network`] if the HTTP
    /// clients cannot be built.
    pub fn new(
        config: &GlobalConfig,
        layout: UpdateLayout,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, UpdateError> {
        layout.validate()?;
        let client = build_http_client(&config.sources)?;
        let checker = VersionChecker::new(
            client,
            config.sources.clone(),
            &layout,
            config.upgrade.metadata_attempts,
        );
        let fetcher = ArtifactFetcher::new(config.sources.clone(), &layout)?;
        let reconciler = DependencyReconciler::new(&layout, &config.upgrade);
        let (phase, _) = watch::channel(UpdatePhase::Idle);

        Ok(Self {
            layout: Arc::new(layout),
            checker,
            fetcher,
            reconciler,
            notifier,
            guard: Mutex::new(()),
            phase: Arc::new(phase),
        })
    }

    /// Create an updater, resolving the layout against the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be determined or the
    /// HTTP clients cannot be built.
    pub fn from_config(config: &GlobalConfig, notifier: Arc<dyn Notifier>) -> anyhow::Result<Self> {
        let layout = UpdateLayout::resolve(config)?;
        Ok(Self::new(config, layout, notifier)?)
    }

    /// The layout this updater operates on.
    #[must_use]
    pub fn layout(&self) -> &UpdateLayout {
        &self.layout
    }

    /// Installed version, `v0.0.0` when unknown.
    pub async fn current_version(&self) -> String {
        self.checker.current_version().await
    }

    /// Describe the installed version and the latest release.
    ///
    /// Always returns a displayable message. When release metadata cannot be
    /// fetched, the message says so instead of failing.
    pub async fn check_version(&self) -> String {
        let current = self.checker.current_version().await;
        match self.checker.latest_release_metadata().await {
            Some(meta) => describe_release(&current, &meta),
            None => format!(
                "Current version: {current}\n\
                 Failed to fetch the latest version information, see the logs for details"
            ),
        }
    }

    /// Subscribe to phase changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<UpdatePhase> {
        self.phase.subscribe()
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> UpdatePhase {
        *self.phase.borrow()
    }

    fn set_phase(&self, phase: UpdatePhase) {
        debug!("Update phase: {}", phase);
        self.phase.send_replace(phase);
    }

    /// Update the application from `channel`, announcing it to `recipient`.
    ///
    /// Returns a message describing the version transition and asking for a
    /// restart. A failed dependency install adds a note to the message but
    /// does not fail the update.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::UpdateInProgress`] if another update is running
    /// - [`UpdateError::ReleaseNotFound`] if release metadata is unavailable
    /// - [`UpdateError::ResolutionFailed`] if no download URL is found
    /// - [`UpdateError::DownloadFailed`] if the download fails
    /// - [`UpdateError::ExtractionFailed`] or [`UpdateError::ArchiveMalformed`]
    ///   if the archive is unusable; the live tree is untouched
    /// - [`UpdateError::PartialSwap`] if the swap stopped halfway
    /// - [`UpdateError::Worker`] if the blocking swap worker died
    pub async fn perform_update(
        &self,
        channel: Channel,
        recipient: &str,
    ) -> Result<String, UpdateError> {
        let Ok(_guard) = self.guard.try_lock() else {
            warn!("Rejecting update request: another update is in progress");
            return Err(UpdateError::UpdateInProgress);
        };

        self.set_phase(UpdatePhase::Idle);
        info!("Starting update from the {} channel", channel);

        let result = self.run_update(channel, recipient).await;
        match &result {
            Ok(_) => self.set_phase(UpdatePhase::Done),
            Err(e) => {
                error!("Update failed: {}", e);
                self.set_phase(UpdatePhase::Aborted);
            }
        }
        result
    }

    async fn run_update(&self, channel: Channel, recipient: &str) -> Result<String, UpdateError> {
        self.set_phase(UpdatePhase::ResolvingVersion);
        let current = self.checker.current_version().await;

        let (release, new_version) = if let Some(branch) = channel.branch() {
            let version = self
                .checker
                .branch_version(branch)
                .await
                .map(|raw| VersionChecker::strip_version_prefix(&raw))
                .filter(|v| !v.is_empty());
            if version.is_none() {
                warn!("Version of the {} branch is unknown, the marker will not be updated", branch);
            }
            (None, version)
        } else {
            let meta =
                self.checker.latest_release_metadata().await.ok_or(UpdateError::ReleaseNotFound)?;
            let name = meta.name.clone();
            (Some(meta), Some(name))
        };
        let shown = new_version.as_deref().unwrap_or(UNKNOWN_VERSION);

        let (url, kind) = self
            .fetcher
            .resolve_download_target(channel, release.as_ref())
            .await
            .ok_or_else(|| UpdateError::ResolutionFailed {
                channel: channel.to_string(),
            })?;

        self.clear_staging().await;

        let announcement = format!("Update detected, version: {current} -> {shown}\nStarting update...");
        if let Err(e) = self.notifier.notify(recipient, &announcement).await {
            warn!("Failed to notify {}: {:#}", recipient, e);
        }

        self.set_phase(UpdatePhase::Downloading);
        let archive = self.fetcher.archive_path(kind);
        if let Err(e) = self.fetcher.download(&url, &archive).await {
            self.clear_staging().await;
            return Err(e);
        }

        let replacer = FileTreeReplacer::new(Arc::clone(&self.layout));
        let phase = Arc::clone(&self.phase);
        let version = new_version.clone();
        let swap = tokio::task::spawn_blocking(move || {
            replacer.replace_observed(&archive, kind, version.as_deref(), |p| {
                debug!("Update phase: {}", p);
                phase.send_replace(p);
            })
        })
        .await
        .map_err(|e| UpdateError::Worker {
            reason: e.to_string(),
        })?;

        if let Err(e) = swap {
            if e.touched_live_tree() {
                // The new manifest may already be in place.
                self.set_phase(UpdatePhase::ReconcilingDependencies);
                self.reconciler.reconcile().await;
            }
            return Err(e);
        }

        self.set_phase(UpdatePhase::ReconcilingDependencies);
        let outcome = self.reconciler.reconcile().await;

        let mut message = format!(
            "Update complete\nVersion: {current} -> {shown}\nRestart the application to finish updating."
        );
        if outcome.needs_attention() {
            message.push_str(&format!(
                "\nNote: dependency installation did not complete ({outcome}), see the logs for details."
            ));
        }
        info!("Updated {} -> {}", current, shown);
        Ok(message)
    }

    async fn clear_staging(&self) {
        match tokio::fs::remove_dir_all(&self.layout.staging_dir).await {
            Ok(()) => debug!("Removed staging area {}", self.layout.staging_dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove staging area {}: {}",
                self.layout.staging_dir.display(),
                e
            ),
        }
    }
}

fn describe_release(current: &str, meta: &ReleaseMetadata) -> String {
    let mut message = VersionChecker::format_version_info(current, Some(&meta.name));
    if !VersionChecker::is_update_available(current, &meta.name) {
        message.push_str(&format!("\nLatest release:  {}", meta.name));
    }
    if let Some(created_at) = meta.created_at {
        message.push_str(&format!("\nReleased:        {}", created_at.format("%Y-%m-%d %H:%M UTC")));
    }
    if let Some(body) = meta.body.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
        message.push_str("\n\nRelease notes:\n");
        message.push_str(body);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_describe_release_with_notes() {
        let meta = ReleaseMetadata {
            name: "v1.2.0".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).single(),
            body: Some("* fixed things\n".to_string()),
            tarball_url: None,
        };
        let message = describe_release("v1.0.0", &meta);
        assert!(message.contains("Latest version:  v1.2.0 (update available)"));
        assert!(message.contains("Released:        2024-03-01 12:30 UTC"));
        assert!(message.ends_with("Release notes:\n* fixed things"));
    }

    #[test]
    fn test_describe_release_up_to_date() {
        let meta = ReleaseMetadata {
            name: "v1.0.0".to_string(),
            created_at: None,
            body: Some("   ".to_string()),
            tarball_url: None,
        };
        let message = describe_release("v1.0.0", &meta);
        assert_eq!(message, "Current version: v1.0.0 (up to date)\nLatest release:  v1.0.0");
    }
}
