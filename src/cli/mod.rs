//! Command-line interface for the updater.
//!
//! # Commands
//!
//! - `check` - Show the installed version and the latest release
//! - `update` - Update the application from a release channel
//! - `current` - Print the installed version
//!
//! # Global Options
//!
//! - `--verbose` / `-v` - Debug logging
//! - `--quiet` / `-q` - Errors only
//! - `--config` / `-c` - Configuration file (default `~/.autoupdate/config.toml`,
//!   or `AUTOUPDATE_CONFIG_PATH`)
//!
//! `RUST_LOG` overrides the level chosen by `--verbose` and `--quiet`.
//!
//! # Examples
//!
//! ```bash
//! autoupdate check
//! autoupdate update --channel dev --recipient ops
//! autoupdate --config /srv/app/autoupdate.toml current
//! ```

mod upgrade;

use crate::config::GlobalConfig;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub use upgrade::{ConsoleNotifier, UpdateArgs};

/// Runtime settings derived from the global flags.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Log filter directive (`debug`, `info`, `error`).
    pub log_level: String,
    /// Explicit configuration file.
    pub config_path: Option<PathBuf>,
}

/// Self-update tool for a long-running host application.
#[derive(Parser)]
#[command(
    name = "autoupdate",
    about = "Check for and install updates of the host application",
    version,
    long_about = "Discovers new releases, downloads the source archive and swaps the \
                  application files, keeping the previous generation as a backup."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, env = "AUTOUPDATE_CONFIG_PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the installed version and the latest release
    Check,
    /// Update the application
    Update(UpdateArgs),
    /// Print the installed version
    Current,
}

impl Cli {
    /// Execute the parsed command.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or the command
    /// fails.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        init_logging(&config.log_level);
        self.execute_with_config(config).await
    }

    /// Derive runtime settings from the global flags.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        };

        CliConfig {
            log_level: log_level.to_string(),
            config_path: self.config.clone(),
        }
    }

    /// Execute with explicit settings, without touching the global logger.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or the command
    /// fails.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        let global = GlobalConfig::load_with_optional(config.config_path).await?;

        match self.command {
            Commands::Check => upgrade::execute_check(&global).await,
            Commands::Update(args) => upgrade::execute_update(args, &global).await,
            Commands::Current => upgrade::execute_current(&global).await,
        }
    }
}

/// Install the global tracing subscriber, writing to stderr.
///
/// `RUST_LOG` wins over `default_level` when set.
pub fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
