mod api;
mod cli;
mod console;
mod controller;
mod controls;
mod dispatch;
mod model;
mod poller;
mod status;
mod stream;
mod text;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    cli::run(args).await
}
