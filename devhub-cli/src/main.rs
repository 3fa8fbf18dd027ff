use anyhow::{Context, Result};
use clap::Parser;
use devhub_config::{ConfigLoader, DevhubConfig, LogLevel};
use devhub_logging::init_logging_from_config;
use devhub_migrate::CancellationToken;
use devhub_store::{load_client, save_client};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, error, info, warn};

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{build_context, MigrationApp};

/// Load configuration from file or use defaults
fn load_config(config_path: Option<&PathBuf>) -> Result<DevhubConfig> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) => {
            if path.exists() {
                loader
                    .from_file(path)
                    .context(format!("Failed to load configuration from {:?}", path))
            } else {
                // Logging is not set up yet
                eprintln!("Configuration file not found: {:?}. Using defaults.", path);
                loader
                    .from_env()
                    .context("Failed to load configuration from environment")
            }
        }
        None => loader
            .from_env()
            .context("Failed to load configuration from environment"),
    }
}

/// Cancel the run on Ctrl-C; the step in flight stops at its next check
fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(component = "cli", "interrupt received, cancelling migration");
            cancel.cancel();
        }
    });
}

async fn run(cli: Cli, config: DevhubConfig, data_path: PathBuf) -> Result<()> {
    let client = load_client(&data_path)
        .await
        .context(format!("Failed to load data from {:?}", data_path))?;
    let app = MigrationApp::new(&config, client.clone())?;

    let cancel = CancellationToken::new();
    let ctx = build_context(&config, cancel.clone());

    let outcome = match &cli.command {
        Commands::Up {
            target,
            tenant,
            skip_tenants,
        } => {
            cancel_on_ctrl_c(cancel);
            let target = target.or(config.migration.target_version);
            app.up(&ctx, target, tenant.as_deref(), *skip_tenants)
                .await
                .map(|_| ())
        }
        Commands::Down { target, tenant } => {
            cancel_on_ctrl_c(cancel);
            app.down(&ctx, *target, tenant.as_deref()).await.map(|_| ())
        }
        Commands::Status { json } => app.print_status(*json).await,
        Commands::List => {
            app.list();
            Ok(())
        }
    };

    // Completed steps are durable even when a later one failed
    if cli.command.mutates() {
        let saved = save_client(&client, &data_path)
            .await
            .context(format!("Failed to save data to {:?}", data_path));
        match (&outcome, saved) {
            (_, Ok(())) => debug!(path = ?data_path, "snapshot saved"),
            (Ok(()), Err(e)) => return Err(e),
            (Err(_), Err(e)) => error!(error = %e, "snapshot not saved after failed run"),
        }
    }

    outcome
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_ref())?;
    if let Some(level) = &cli.log_level {
        config.logging.level = LogLevel::from_str(level).map_err(anyhow::Error::msg)?;
    }
    init_logging_from_config(&config.logging)?;

    let data_path = cli
        .data
        .clone()
        .unwrap_or_else(|| config.store.data_path.clone());
    info!(component = "cli", database = %config.store.database, "devhub-migrate starting");

    run(cli, config, data_path).await
}
