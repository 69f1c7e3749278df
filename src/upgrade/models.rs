//! Shared data model of the update pipeline.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// Release channel selected for one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
pub enum Channel {
    /// Tagged releases from the release index, shipped as tar-gzip.
    #[default]
    Release,
    /// Snapshot of the main branch, shipped as zip.
    Main,
    /// Snapshot of the dev branch, shipped as zip.
    Dev,
}

impl Channel {
    /// Branch backing this channel, `None` for tagged releases.
    #[must_use]
    pub const fn branch(self) -> Option<&'static str> {
        match self {
            Self::Release => None,
            Self::Main => Some("main"),
            Self::Dev => Some("dev"),
        }
    }

    /// Archive format served for this channel.
    #[must_use]
    pub const fn archive_kind(self) -> ArchiveKind {
        match self {
            Self::Release => ArchiveKind::TarGz,
            Self::Main | Self::Dev => ArchiveKind::Zip,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Release => "release",
            Self::Main => "main",
            Self::Dev => "dev",
        };
        f.write_str(name)
    }
}

/// Archive format of a downloaded artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// gzip-compressed tarball
    TarGz,
    /// zip archive
    Zip,
}

/// Release information returned by the release index.
///
/// Fetched per check and never persisted. Only `name` is required.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseMetadata {
    /// Release name, used as the version token (e.g., `v1.2.3`).
    pub name: String,
    /// Publication time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Release notes.
    #[serde(default)]
    pub body: Option<String>,
    /// Source tarball endpoint. Answers with a redirect to the actual archive.
    #[serde(default)]
    pub tarball_url: Option<String>,
}

/// Phase of the update state machine.
///
/// `Idle → ResolvingVersion → Downloading → Extracting → Swapping →
/// ReconcilingDependencies → Done`. Any non-terminal phase may move to
/// `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdatePhase {
    #[default]
    Idle,
    ResolvingVersion,
    Downloading,
    Extracting,
    Swapping,
    ReconcilingDependencies,
    Done,
    Aborted,
}

impl UpdatePhase {
    /// Whether the phase ends a run.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ResolvingVersion => "resolving version",
            Self::Downloading => "downloading",
            Self::Extracting => "extracting",
            Self::Swapping => "swapping",
            Self::ReconcilingDependencies => "reconciling dependencies",
            Self::Done => "done",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Result of locating the top-level directory of an extracted archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveRoot {
    /// First directory under the extraction target, in name order.
    Root(PathBuf),
    /// The extraction target holds no directory.
    Malformed,
}

/// What a completed file swap did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwapReport {
    /// Manifest files moved into the backup area.
    pub manifests_backed_up: Vec<String>,
    /// Manifest files promoted from the archive.
    pub manifests_promoted: Vec<String>,
    /// Replace folders moved into the backup area.
    pub folders_backed_up: Vec<PathBuf>,
    /// Replace folders promoted from the archive.
    pub folders_promoted: Vec<PathBuf>,
    /// Version written to the marker, if any.
    pub committed_version: Option<String>,
}

/// Outcome of the post-update dependency installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No manifest present, the installer was not run.
    Skipped,
    /// The installer exited successfully.
    Installed,
    /// The installer exited non-zero (`code`) or timed out (`None`).
    Failed {
        /// Exit code, `None` on timeout or signal.
        code: Option<i32>,
    },
    /// The installer program is not on `PATH`.
    CommandMissing,
}

impl ReconcileOutcome {
    /// Whether the outcome warrants a note in the result message.
    #[must_use]
    pub const fn needs_attention(self) -> bool {
        matches!(self, Self::Failed { .. } | Self::CommandMissing)
    }
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped => f.write_str("skipped, no manifest"),
            Self::Installed => f.write_str("installed"),
            Self::Failed {
                code: Some(code),
            } => write!(f, "installer exited with code {code}"),
            Self::Failed {
                code: None,
            } => f.write_str("installer timed out or was killed"),
            Self::CommandMissing => f.write_str("installer not found"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_kinds() {
        assert_eq!(Channel::Release.archive_kind(), ArchiveKind::TarGz);
        assert_eq!(Channel::Main.archive_kind(), ArchiveKind::Zip);
        assert_eq!(Channel::Dev.branch(), Some("dev"));
        assert_eq!(Channel::Release.branch(), None);
        assert_eq!(Channel::Main.to_string(), "main");
    }

    #[test]
    fn test_release_metadata_optional_fields() {
        let meta: ReleaseMetadata = serde_json::from_str(r#"{"name": "v1.1.0"}"#).unwrap();
        assert_eq!(meta.name, "v1.1.0");
        assert!(meta.created_at.is_none());
        assert!(meta.tarball_url.is_none());

        let meta: ReleaseMetadata = serde_json::from_str(
            r#"{"name": "v2.0.0", "created_at": "2024-05-01T10:00:00Z",
                "body": "notes", "tarball_url": "https://x/t", "extra": 1}"#,
        )
        .unwrap();
        assert_eq!(meta.body.as_deref(), Some("notes"));
        assert_eq!(meta.created_at.unwrap().to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn test_release_metadata_requires_name() {
        assert!(serde_json::from_str::<ReleaseMetadata>(r#"{"body": "x"}"#).is_err());
    }

    #[test]
    fn test_phase_terminal() {
        assert!(UpdatePhase::Done.is_terminal());
        assert!(UpdatePhase::Aborted.is_terminal());
        assert!(!UpdatePhase::Swapping.is_terminal());
        assert_eq!(UpdatePhase::default(), UpdatePhase::Idle);
    }

    #[test]
    fn test_reconcile_attention() {
        assert!(!ReconcileOutcome::Skipped.needs_attention());
        assert!(!ReconcileOutcome::Installed.needs_attention());
        assert!(ReconcileOutcome::CommandMissing.needs_attention());
        assert!(
            ReconcileOutcome::Failed {
                code: Some(1),
            }
            .needs_attention()
        );
    }
}
