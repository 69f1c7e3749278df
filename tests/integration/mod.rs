//! Integration test suite for autoupdate
//!
//! End-to-end tests of the update pipeline against a mock HTTP server, and of
//! the `autoupdate` binary. These tests run quickly and are executed on every
//! commit.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **update_flow**: Release and branch updates through `SelfUpdater`
//! - **cli**: The `autoupdate` command line

mod cli;
mod update_flow;
