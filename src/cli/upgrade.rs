use crate::config::GlobalConfig;
use crate::upgrade::{Channel, Notifier, SelfUpdater};
use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use colored::Colorize;
use std::sync::Arc;
use tracing::debug;

/// Arguments of `autoupdate update`.
#[derive(Parser, Debug)]
pub struct UpdateArgs {
    /// Release channel to update from
    #[arg(long, value_enum, default_value_t = Channel::Release)]
    pub channel: Channel,

    /// Who receives the "update starting" announcement
    /// (defaults to `upgrade.notify_recipient`)
    #[arg(long)]
    pub recipient: Option<String>,
}

/// Notifier printing announcements to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn notify(&self, recipient: &str, message: &str) -> Result<()> {
        eprintln!("{} {}", format!("[to {recipient}]").dimmed(), message.cyan());
        Ok(())
    }
}

fn build_updater(config: &GlobalConfig) -> Result<SelfUpdater> {
    SelfUpdater::from_config(config, Arc::new(ConsoleNotifier))
        .context("Failed to initialize the updater")
}

pub async fn execute_check(config: &GlobalConfig) -> Result<()> {
    let updater = build_updater(config)?;
    println!("{}", "Checking for updates...".cyan());
    println!("{}", updater.check_version().await);
    Ok(())
}

pub async fn execute_current(config: &GlobalConfig) -> Result<()> {
    let updater = build_updater(config)?;
    debug!("Reading version marker {}", updater.layout().version_file.display());
    println!("{}", updater.current_version().await);
    Ok(())
}

pub async fn execute_update(args: UpdateArgs, config: &GlobalConfig) -> Result<()> {
    let updater = build_updater(config)?;
    let recipient = args.recipient.unwrap_or_else(|| config.upgrade.notify_recipient.clone());

    println!("{}", format!("Updating from the {} channel...", args.channel).cyan());
    let message = updater.perform_update(args.channel, &recipient).await?;

    let mut lines = message.lines();
    if let Some(headline) = lines.next() {
        println!("{}", headline.green().bold());
    }
    for line in lines {
        if line.starts_with("Note:") {
            println!("{}", line.yellow());
        } else {
            println!("{line}");
        }
    }
    Ok(())
}
