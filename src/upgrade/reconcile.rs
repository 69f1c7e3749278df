//! Post-update dependency installation.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::config::UpdateLayout;
use crate::upgrade::config::UpgradeConfig;
use crate::upgrade::models::ReconcileOutcome;

/// Placeholder in installer arguments replaced by the manifest path.
const MANIFEST_PLACEHOLDER: &str = "{manifest}";

/// Runs the external dependency installer after a swap.
///
/// The installer is an opaque command (by default `pip install -r
/// requirements.txt`) run from the application root. Its result is reported as
/// a [`ReconcileOutcome`] and never fails the update: the new files are in
/// place either way, and a broken install is for an operator to look at.
#[derive(Debug, Clone)]
pub struct DependencyReconciler {
    program: String,
    args: Vec<String>,
    manifest: PathBuf,
    working_dir: PathBuf,
    timeout_duration: Duration,
}

impl DependencyReconciler {
    /// Create a reconciler from the installer settings.
    #[must_use]
    pub fn new(layout: &UpdateLayout, config: &UpgradeConfig) -> Self {
        Self {
            program: config.installer_program.clone(),
            args: config.installer_args.clone(),
            manifest: layout.installer_manifest.clone(),
            working_dir: layout.app_root.clone(),
            timeout_duration: Duration::from_secs(config.installer_timeout_secs),
        }
    }

    /// Override the installer timeout.
    #[must_use]
    pub const fn with_timeout(mut self, duration: Duration) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Installer arguments with the manifest path substituted.
    #[must_use]
    pub fn resolved_args(&self) -> Vec<String> {
        let manifest = self.manifest.display().to_string();
        self.args.iter().map(|arg| arg.replace(MANIFEST_PLACEHOLDER, &manifest)).collect()
    }

    /// Install dependencies from the manifest, if there is one.
    pub async fn reconcile(&self) -> ReconcileOutcome {
        if !self.manifest.exists() {
            debug!("No {} found, skipping dependency install", self.manifest.display());
            return ReconcileOutcome::Skipped;
        }

        let program = match which::which(&self.program) {
            Ok(path) => path,
            Err(e) => {
                error!("Dependency installer '{}' not found: {}", self.program, e);
                return ReconcileOutcome::CommandMissing;
            }
        };

        let args = self.resolved_args();
        info!("Installing dependencies: {} {}", self.program, args.join(" "));

        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout(self.timeout_duration, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                error!("Failed to run dependency installer '{}': {}", self.program, e);
                return ReconcileOutcome::Failed {
                    code: None,
                };
            }
            Err(_) => {
                error!(
                    "Dependency installer timed out after {} seconds",
                    self.timeout_duration.as_secs()
                );
                return ReconcileOutcome::Failed {
                    code: None,
                };
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if output.status.success() {
            if !stdout.trim().is_empty() {
                info!("Dependency installer output:\n{}", stdout.trim_end());
            }
            ReconcileOutcome::Installed
        } else {
            error!("Dependency installer failed with exit code {:?}", output.status.code());
            if !stderr.trim().is_empty() {
                error!("{}", stderr.trim_end());
            }
            ReconcileOutcome::Failed {
                code: output.status.code(),
            }
        }
    }
}
