use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Snowdrift - a Snowball consensus simulator
#[derive(Parser)]
#[command(name = "snowdrift")]
#[command(about = "Simulate sample-based consensus over a shared peer registry")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a full simulation
    Simulate {
        /// Path to the simulation configuration file
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,
    },

    /// Write a sample simulation configuration
    Init {
        /// Output path for the configuration file
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },
}
