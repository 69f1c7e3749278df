//! autoupdate - self-update core for long-running host applications
//!
//! The crate checks whether a newer release of the host application exists,
//! downloads the matching source archive and replaces the application's files
//! on disk. Configuration, data folders and dependency manifests survive the
//! update through a backup-then-swap strategy: the previous generation of every
//! replaced file and folder is kept in a backup area.
//!
//! # Release Channels
//!
//! - **release**: tagged releases from a release index (JSON metadata), shipped
//!   as tar-gzip behind a one-hop redirect
//! - **main** / **dev**: branch snapshots shipped as zip, versioned by a raw
//!   version file in the branch
//!
//! # Modules
//!
//! - [`upgrade`] - Version resolution, download, extraction, swap and the
//!   orchestrating [`upgrade::SelfUpdater`]
//! - [`config`] - TOML configuration and the resolved [`config::UpdateLayout`]
//! - [`core`] - [`core::UpdateError`] and user-facing error rendering
//! - [`cli`] - The `autoupdate` command line
//! - [`utils`] - File moves with a cross-filesystem fallback
//! - [`constants`] - Timeouts, retry parameters and staging file names
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use autoupdate::config::GlobalConfig;
//! use autoupdate::upgrade::{Channel, LogNotifier, SelfUpdater};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = GlobalConfig::load().await?;
//! let updater = SelfUpdater::from_config(&config, Arc::new(LogNotifier))?;
//!
//! println!("{}", updater.check_version().await);
//! let message = updater.perform_update(Channel::Release, "admin").await?;
//! println!("{message}");
//! # Ok(())
//! # }
//! ```
//!
//! # Version Marker
//!
//! The installed version lives in a one-line file, `__version__: v1.2.3`. It is
//! rewritten only after a successful swap.

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod upgrade;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
