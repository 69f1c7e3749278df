//! Test utilities for the updater
//!
//! Helpers shared by unit tests and the integration suite:
//! - Logging initialization that works with the test harness
//! - Archive builders for tar-gzip and zip fixtures
//! - A temporary application tree with a resolved [`UpdateLayout`]
//!
//! # Example
//!
//! ```rust,no_run
//! use autoupdate::test_utils::fixtures::{TestLayout, tar_gz_bytes};
//!
//! let env = TestLayout::new(&["plugins"]);
//! env.write_live("app/plugins/old.py", "old");
//! let archive = tar_gz_bytes(&[("app-v1.1.0/app/plugins/new.py", "new")]);
//! assert!(!archive.is_empty());
//! ```
//!
//! [`UpdateLayout`]: crate::config::UpdateLayout

pub mod fixtures;

pub use fixtures::{TestLayout, tar_gz_bytes, write_tar_gz, write_zip, zip_bytes};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Initializes the tracing subscriber once, no matter how often it is called.
/// Uses `level` when given, otherwise `RUST_LOG`. Without either, logging stays
/// off.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
