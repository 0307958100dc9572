use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

mod cli;
mod config;
mod node;
mod sim;

use cli::{Cli, Commands};
use config::SimulationConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .pretty()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate { config } => {
            simulate(config).await?;
        }
        Commands::Init { output } => {
            init_config(output)?;
        }
    }

    Ok(())
}

/// Run a simulation from a configuration file
async fn simulate(config_path: PathBuf) -> Result<()> {
    info!("Loading configuration from {:?}", config_path);

    let config = if config_path.exists() {
        SimulationConfig::load(&config_path)?
    } else {
        error!(
            "Configuration file not found: {:?}. Run 'snowdrift init' to create one.",
            config_path
        );
        return Err(anyhow::anyhow!("Configuration file not found"));
    };

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested, cancelling in-flight rounds");
            signal_cancel.cancel();
        }
    });

    sim::run(&config, cancel).await?;

    Ok(())
}

/// Write a sample configuration file
fn init_config(output: PathBuf) -> Result<()> {
    info!("Generating sample configuration");

    let config = SimulationConfig::default();
    config.save(&output)?;

    info!("Configuration saved to {:?}", output);

    println!("\nConfiguration file created: {}", output.display());
    println!("Edit the file to customize the simulation.");
    println!("\nTo run the simulation:");
    println!("  snowdrift simulate --config {}", output.display());

    Ok(())
}
