//! Error handling for the updater
//!
//! This module provides the strongly-typed error enum used by every update
//! component and the user-facing error reporting used by the CLI. The design
//! follows two principles:
//! 1. **Strongly-typed errors** so callers can react to specific failures
//! 2. **User-friendly messages** with actionable suggestions for operators
//!
//! # Error Categories
//!
//! - **Resolution**: [`UpdateError::ReleaseNotFound`], [`UpdateError::ResolutionFailed`]
//! - **Transfer**: [`UpdateError::Network`], [`UpdateError::DownloadFailed`]
//! - **Archive**: [`UpdateError::ArchiveMalformed`], [`UpdateError::ExtractionFailed`]
//! - **File tree**: [`UpdateError::PartialSwap`]
//! - **Orchestration**: [`UpdateError::UpdateInProgress`], [`UpdateError::Worker`]
//! - **Layout**: [`UpdateError::LayoutConflict`]
//!
//! Use [`user_friendly_error`] to turn any [`anyhow::Error`] into an
//! [`ErrorContext`] with details and a suggestion.
//!
//! # Examples
//!
//! ```rust,no_run
//! use autoupdate::core::{UpdateError, user_friendly_error};
//!
//! let error = anyhow::Error::from(UpdateError::UpdateInProgress);
//! let ctx = user_friendly_error(error);
//! ctx.display(); // colored error, details and suggestion on stderr
//! ```

use colored::Colorize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The step of the file-tree swap that was running when a filesystem error hit.
///
/// Carried by [`UpdateError::PartialSwap`] so operators know how far the swap
/// got before it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapStep {
    /// Moving live manifest files into the backup area.
    ManifestBackup,
    /// Moving new manifest files into the live tree.
    ManifestPromotion,
    /// Moving live replace-folders into the backup area.
    FolderBackup,
    /// Moving new replace-folders into the live tree.
    FolderPromotion,
    /// Writing the new version into the version marker.
    VersionCommit,
}

impl fmt::Display for SwapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ManifestBackup => "manifest backup",
            Self::ManifestPromotion => "manifest promotion",
            Self::FolderBackup => "folder backup",
            Self::FolderPromotion => "folder promotion",
            Self::VersionCommit => "version commit",
        };
        f.write_str(name)
    }
}

/// The main error type for update operations
///
/// Each variant represents one failure mode of the update pipeline and carries
/// the context (URL, path, step) an operator needs to act on it.
///
/// # Examples
///
/// ```rust,no_run
/// use autoupdate::core::UpdateError;
///
/// fn describe(error: &UpdateError) -> &'static str {
///     match error {
///         UpdateError::UpdateInProgress => "try again later",
///         UpdateError::PartialSwap { .. } => "restore from the backup directory",
///         _ => "see logs",
///     }
/// }
/// ```
#[derive(Error, Debug)]
pub enum UpdateError {
    /// A network request failed at the transport level or returned a bad status.
    #[error("Network error during {operation}: {reason}")]
    Network {
        /// The request that failed (e.g., "release metadata")
        operation: String,
        /// Transport error or HTTP status
        reason: String,
    },

    /// The release index did not yield usable metadata after all attempts.
    #[error("Failed to fetch the latest release information")]
    ReleaseNotFound,

    /// No download URL could be determined for the requested channel.
    #[error("Failed to resolve a download link for the {channel} channel")]
    ResolutionFailed {
        /// Channel name ("release", "main", "dev")
        channel: String,
    },

    /// The artifact download failed.
    #[error("Failed to download update archive from {url}: {reason}")]
    DownloadFailed {
        /// URL that was being downloaded
        url: String,
        /// Status code or stream error
        reason: String,
    },

    /// The extracted archive has no top-level directory.
    #[error("Update archive {} is malformed: no top-level directory found", path.display())]
    ArchiveMalformed {
        /// Archive that was extracted
        path: PathBuf,
    },

    /// The archive could not be read or unpacked.
    #[error("Failed to extract update archive {}: {reason}", path.display())]
    ExtractionFailed {
        /// Archive that failed to extract
        path: PathBuf,
        /// Underlying decoder or I/O error
        reason: String,
    },

    /// A filesystem error interrupted the swap after it had started.
    ///
    /// The live tree may be partially swapped. The version marker has not been
    /// committed, so it still names the previous version.
    #[error(
        "Update left in an inconsistent state during {step} at {}; manual recovery required",
        path.display()
    )]
    PartialSwap {
        /// The swap step that failed
        step: SwapStep,
        /// The path being moved or removed
        path: PathBuf,
        /// The underlying filesystem error
        #[source]
        source: std::io::Error,
    },

    /// Another update is already running in this process.
    #[error("An update is already in progress")]
    UpdateInProgress,

    /// The blocking worker running the file swap panicked or was cancelled.
    #[error("Update worker failed: {reason}")]
    Worker {
        /// Join error description
        reason: String,
    },

    /// The staging or backup area overlaps a path the swap moves or deletes.
    ///
    /// Raised before any file is touched.
    #[error("The {area} area {} overlaps {}", path.display(), conflict.display())]
    LayoutConflict {
        /// `"staging"` or `"backup"`
        area: &'static str,
        /// The offending area
        path: PathBuf,
        /// The replace folder, area or application root it overlaps
        conflict: PathBuf,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl UpdateError {
    /// Whether the live application tree may have been modified by this failure.
    ///
    /// Only [`UpdateError::PartialSwap`] can leave the tree half-swapped. Every
    /// other variant is raised before the first live file is moved.
    #[must_use]
    pub const fn touched_live_tree(&self) -> bool {
        matches!(self, Self::PartialSwap { .. })
    }
}

/// Error context wrapper that provides user-friendly error information
///
/// Holds the rendered error message plus optional details and a suggestion.
/// When displayed, the error is red, details yellow and the suggestion green.
///
/// # Examples
///
/// ```rust,no_run
/// use autoupdate::core::ErrorContext;
///
/// let context = ErrorContext::new("Update failed")
///     .with_suggestion("Check the logs with --verbose")
///     .with_details("The archive server returned 503");
/// context.display();
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The main error message
    pub message: String,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// Recognizes [`UpdateError`] variants, [`std::io::Error`] kinds and
/// [`toml::de::Error`]. Anything else is rendered with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(update_error) = error.downcast_ref::<UpdateError>() {
        return create_error_context(update_error);
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(format!("Permission denied: {io_error}"))
                    .with_suggestion("Run the updater as the user that owns the application directory")
                    .with_details("The updater moves files inside the application, backup and staging directories");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(format!("File not found: {io_error}"))
                    .with_suggestion("Check the paths in the [paths] section of the configuration file");
            }
            _ => {}
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(format!("Invalid configuration file: {toml_error}"))
            .with_suggestion("Check the TOML syntax of the configuration file. Verify quotes, brackets, and key names");
    }

    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(message)
}

fn create_error_context(error: &UpdateError) -> ErrorContext {
    let context = ErrorContext::new(error.to_string());
    match error {
        UpdateError::Network { .. } | UpdateError::ReleaseNotFound => context
            .with_suggestion("Check your internet connection and the [sources] URLs, then try again")
            .with_details("The release index may also be rate limiting unauthenticated requests"),

        UpdateError::ResolutionFailed { channel } => context
            .with_suggestion(format!(
                "Verify the download URL configured for the {channel} channel is reachable"
            ))
            .with_details("No files were changed"),

        UpdateError::DownloadFailed { .. } => context
            .with_suggestion("Retry the update; the download is restarted from scratch on every run")
            .with_details("No files were changed"),

        UpdateError::ArchiveMalformed { .. } | UpdateError::ExtractionFailed { .. } => context
            .with_suggestion("Retry the update or pick another channel; the archive may be truncated")
            .with_details("The archive is validated before any file is moved, so no files were changed"),

        UpdateError::PartialSwap { source, .. } => context
            .with_suggestion(
                "Restore the moved files from the backup directory, or rerun the update once the cause is fixed",
            )
            .with_details(format!(
                "Underlying error: {source}. The version marker still names the previous version"
            )),

        UpdateError::UpdateInProgress => context
            .with_suggestion("Wait for the running update to finish before starting another one"),

        UpdateError::LayoutConflict { .. } => context
            .with_suggestion(
                "Point [paths] staging_dir and backup_dir outside every replace folder and outside each other",
            )
            .with_details("No files were changed"),

        UpdateError::Worker { .. } | UpdateError::IoError(_) => context,
    }
}
