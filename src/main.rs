//! tubeqa CLI entry point.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tubeqa::cli::{commands, Cli, Commands};
use tubeqa::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Initialize logging
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("tubeqa={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match &cli.command {
        Commands::Ask { video, question } => {
            commands::run_ask(video, question, settings).await?;
        }

        Commands::Chat { video } => {
            commands::run_chat(video, settings).await?;
        }

        Commands::Index { video, force } => {
            commands::run_index(video, *force, settings).await?;
        }

        Commands::Cache { action } => {
            commands::run_cache(action, settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host.clone(), *port, settings).await?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings)?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings)?;
        }
    }

    Ok(())
}
