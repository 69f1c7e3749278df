//! Configuration management for the updater
//!
//! - [`global`]: the TOML configuration file ([`GlobalConfig`]) with its
//!   `[paths]`, `[sources]` and `[upgrade]` sections
//! - [`layout`]: the resolved [`UpdateLayout`] every update component receives
//!
//! Configuration is loaded once, resolved into an immutable layout and then
//! passed by `Arc` to the components. Nothing re-reads the file mid-update.
//!
//! # Examples
//!
//! ```rust,no_run
//! use autoupdate::config::{GlobalConfig, UpdateLayout};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = GlobalConfig::load().await?;
//! let layout = UpdateLayout::resolve(&config)?;
//! println!("Backups go to {}", layout.backup_dir.display());
//! # Ok(())
//! # }
//! ```

pub mod global;
pub mod layout;

pub use global::{CONFIG_PATH_ENV, GlobalConfig, PathsConfig, SourcesConfig};
pub use layout::UpdateLayout;
