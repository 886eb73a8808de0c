//! Podwise CLI entry point.

use anyhow::Result;
use clap::Parser;
use podwise::cli::{commands, Cli, Commands};
use podwise::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("podwise={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Ensure the data directory exists
    std::fs::create_dir_all(settings.data_dir())?;

    // Execute command
    match cli.command {
        Commands::Run {
            filter,
            force,
            retry,
            dry_run,
            no_rate_limit,
            model,
            auto_sync,
            prefetch,
        } => {
            commands::run_pipeline(
                commands::RunParams {
                    filter,
                    force,
                    retry,
                    dry_run,
                    no_rate_limit,
                    model,
                    auto_sync,
                    prefetch,
                },
                settings,
            )
            .await?;
        }

        Commands::List { filter } => {
            commands::run_list(filter, settings).await?;
        }

        Commands::Stats => {
            commands::run_stats(settings).await?;
        }

        Commands::Status { limit } => {
            commands::run_status(limit, settings).await?;
        }

        Commands::Export { from, to } => {
            commands::run_export(from, to, settings).await?;
        }

        Commands::Models => {
            commands::run_models()?;
        }

        Commands::Config { action } => {
            commands::run_config(&action, settings)?;
        }
    }

    Ok(())
}
