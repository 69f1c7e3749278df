//! Core types for the updater
//!
//! This module provides the error handling foundation shared by every update
//! component and by the CLI.
//!
//! # Error Management
//!
//! - **Strongly-typed errors** ([`UpdateError`]) for precise handling in code
//! - **User-friendly contexts** ([`ErrorContext`]) with actionable suggestions
//! - **Automatic conversion** from [`std::io::Error`] and [`toml::de::Error`]
//!
//! # Examples
//!
//! ```rust,no_run
//! use autoupdate::core::{UpdateError, user_friendly_error};
//! use anyhow::Result;
//!
//! fn example_operation() -> Result<String> {
//!     Err(UpdateError::ReleaseNotFound.into())
//! }
//!
//! if let Err(e) = example_operation() {
//!     user_friendly_error(e).display();
//! }
//! ```

pub mod error;

pub use error::{ErrorContext, SwapStep, UpdateError, user_friendly_error};
