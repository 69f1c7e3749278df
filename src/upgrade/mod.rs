//! Self-update functionality for the host application.
//!
//! This module discovers whether a newer release of the application exists,
//! downloads the matching source archive and replaces the application's files
//! on disk. User state (configuration, data folders, dependency manifests) is
//! preserved through a backup-then-swap strategy.
//!
//! # Architecture Overview
//!
//! ## Core Components
//!
//! - **[`SelfUpdater`]**: Orchestrates a run and guards against concurrent runs
//! - **[`VersionChecker`]**: Reads the version marker and queries release and
//!   branch version endpoints
//! - **[`ArtifactFetcher`]**: Resolves the download URL per channel and streams
//!   the archive into staging
//! - **[`ArchiveExtractor`]**: Unpacks tar-gzip and zip archives and finds their
//!   top-level directory
//! - **[`FileTreeReplacer`]**: Backs up and swaps manifests and replace folders
//! - **[`DependencyReconciler`]**: Runs the external dependency installer
//! - **[`Notifier`]**: Announces an update to an administrator
//!
//! ## Update Process Flow
//!
//! ```text
//! 1. Version Resolution
//!    ├── Read the version marker (v0.0.0 when absent)
//!    └── Release: fetch metadata (3 attempts) / Branch: fetch version file
//!
//! 2. Download
//!    ├── Release: follow one redirect from the tarball URL
//!    ├── Branch: use the configured zip URL
//!    ├── Clear stale staging, notify the administrator
//!    └── Stream the archive into staging
//!
//! 3. Swap (blocking worker)
//!    ├── Extract and locate the archive root
//!    ├── Back up and promote manifest files
//!    ├── Back up (single generation) and promote replace folders
//!    ├── Remove the archive and staging area
//!    └── Commit the new version to the marker
//!
//! 4. Post-Update
//!    ├── Install dependencies from the new manifest
//!    └── Ask for a manual restart
//! ```
//!
//! # Safety Mechanisms
//!
//! - Nothing in the live tree moves until the archive is fully extracted and
//!   its root is located
//! - The version marker is written last, so it never claims a version whose
//!   files are not in place
//! - A swap that stops halfway reports [`UpdateError::PartialSwap`] with the
//!   step and path, for manual recovery from the backup area
//! - A failed dependency install never turns a completed swap into a failure
//!
//! Non-features: concurrent updates (rejected), signature or checksum
//! verification of archives, rollback of a completed swap.
//!
//! # Usage
//!
//! ```bash
//! autoupdate check                      # Show installed and latest versions
//! autoupdate update                     # Update from the release channel
//! autoupdate update --channel dev       # Update from the dev branch
//! ```
//!
//! ```rust,no_run
//! use autoupdate::config::GlobalConfig;
//! use autoupdate::upgrade::{Channel, LogNotifier, SelfUpdater};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let updater = SelfUpdater::from_config(&GlobalConfig::load().await?, Arc::new(LogNotifier))?;
//! match updater.perform_update(Channel::Release, "admin").await {
//!     Ok(message) => println!("{message}"),
//!     Err(e) => eprintln!("Update failed: {e}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`UpdateError::PartialSwap`]: crate::core::UpdateError::PartialSwap

/// Archive extraction and root discovery.
pub mod archive;
/// Configuration of swap sets and the dependency installer.
pub mod config;
/// Download target resolution and streaming download.
pub mod fetcher;
/// Shared data model: channels, release metadata, phases, outcomes.
pub mod models;
/// Administrator notification seam.
pub mod notify;
/// Dependency installation after a swap.
pub mod reconcile;
/// Backup-then-swap of the live application tree.
pub mod replacer;
/// Update orchestration.
pub mod self_updater;
/// Version marker reading and remote version queries.
pub mod version_check;


pub use archive::ArchiveExtractor;
pub use fetcher::ArtifactFetcher;
pub use models::{
    ArchiveKind, ArchiveRoot, Channel, ReconcileOutcome, ReleaseMetadata, SwapReport, UpdatePhase,
};
pub use notify::{LogNotifier, Notifier, RecordingNotifier};
pub use reconcile::DependencyReconciler;
pub use replacer::FileTreeReplacer;
pub use self_updater::SelfUpdater;
pub use version_check::VersionChecker;
