use crate::api::{DeployApi, DeployBackend};
use crate::model::{ActionKind, ConsoleConfig};
use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "deploy-console",
    version,
    about = "Status console for the Mr Deploy controller"
)]
pub struct Cli {
    /// Base URL of the deploy controller's web front end
    #[arg(long, default_value = "http://localhost:5000")]
    pub base_url: String,

    /// Status poll interval (fallback channel; the push stream is primary)
    #[arg(long, default_value = "3s")]
    pub poll_interval: humantime::Duration,

    /// Delay between stream reconnection attempts
    #[arg(long, default_value = "3s")]
    pub reconnect_delay: humantime::Duration,

    /// Consecutive failed reconnects tolerated before a full resynchronization
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Fetch status once more right after an action request settles
    #[arg(long)]
    pub refresh_after_action: bool,

    /// Follow output on stdout without the TUI
    #[arg(long)]
    pub text: bool,

    /// Fetch the current status as JSON and exit
    #[arg(long)]
    pub status: bool,

    /// Send a single control action and exit
    #[arg(long, value_enum, value_name = "ACTION")]
    pub please: Option<ActionKind>,
}

/// Build the runtime config from CLI arguments.
pub fn build_config(args: &Cli) -> ConsoleConfig {
    ConsoleConfig {
        base_url: args.base_url.clone(),
        poll_interval: Duration::from(args.poll_interval),
        reconnect_delay: Duration::from(args.reconnect_delay),
        max_retries: args.max_retries,
        refresh_after_action: args.refresh_after_action,
        user_agent: format!("deploy-console/{}", env!("CARGO_PKG_VERSION")),
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args);

    if args.status {
        return print_status(&cfg).await;
    }
    if let Some(action) = args.please {
        return send_action_once(&cfg, action).await;
    }
    if args.text {
        return crate::text::run(cfg).await;
    }

    #[cfg(feature = "tui")]
    return crate::tui::run(cfg).await;
    // Fallback when built without TUI support.
    #[cfg(not(feature = "tui"))]
    return crate::text::run(cfg).await;
}

async fn print_status(cfg: &ConsoleConfig) -> Result<()> {
    let api = DeployApi::new(cfg)?;
    let running = api.fetch_status().await.context("fetch status")?;
    println!("{}", serde_json::json!({ "running": running }));
    Ok(())
}

async fn send_action_once(cfg: &ConsoleConfig, action: ActionKind) -> Result<()> {
    let api = DeployApi::new(cfg)?;
    api.send_action(action)
        .await
        .with_context(|| format!("send {} command", action.as_str()))?;
    // One follow-up fetch so the caller sees where things landed.
    let running = api
        .fetch_status()
        .await
        .context("fetch status after action")?;
    println!("{}", serde_json::json!({ "running": running }));
    Ok(())
}
