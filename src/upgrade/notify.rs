//! Administrator notification seam.

use async_trait::async_trait;
use std::sync::Mutex;
use tracing::info;

/// Delivers update announcements to an administrator.
///
/// The updater calls [`notify`](Notifier::notify) once per run, right before
/// the download starts. A delivery error is logged by the caller and otherwise
/// ignored, so implementations need not retry.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `message` to `recipient`.
    async fn notify(&self, recipient: &str, message: &str) -> anyhow::Result<()>;
}

/// Notifier that writes announcements to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, recipient: &str, message: &str) -> anyhow::Result<()> {
        info!(recipient, "{}", message);
        Ok(())
    }
}

/// Notifier that records every announcement in memory.
///
/// Useful for embedding hosts that forward announcements on their own
/// schedule, and for tests.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    /// Announcements sent so far, as `(recipient, message)` pairs.
    #[must_use]
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, recipient: &str, message: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("notification log poisoned"))?
            .push((recipient.to_string(), message.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_notifier() {
        let notifier = RecordingNotifier::default();
        notifier.notify("admin", "hello").await.unwrap();
        assert_eq!(notifier.sent(), vec![("admin".to_string(), "hello".to_string())]);
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        assert!(LogNotifier.notify("admin", "hello").await.is_ok());
    }
}
