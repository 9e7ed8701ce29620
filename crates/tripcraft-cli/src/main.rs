//! Tripcraft CLI - AI travel planning assistant
//!
//! Usage:
//!   tripcraft chat "五一去哪玩"        Ask the assistant
//!   tripcraft plan -d 北京 --days 3    Generate a travel plan
//!   tripcraft budget -d 北京 -s 3000   Analyze budget usage
//!   tripcraft geocode 东京 北京        Resolve place coordinates

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Chat { message } => commands::cmd_chat(&message).await,
        Commands::Plan {
            destination,
            days,
            budget,
            style,
            interests,
            travelers,
            json,
        } => {
            commands::cmd_plan(
                &destination,
                days,
                &budget,
                &style,
                &interests,
                travelers,
                json,
            )
            .await
        }
        Commands::Budget {
            destination,
            days,
            budget,
            spent,
        } => commands::cmd_budget(&destination, days, &budget, spent).await,
        Commands::Geocode { addresses } => commands::cmd_geocode(&addresses).await,
    }
}
