//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "chain-analyst",
    about = "Heuristic blockchain-governance analysis agent",
    version
)]
pub struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding analyst.toml.
    #[arg(long, global = true, default_value = ".")]
    pub config_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List registered analysis tasks and their data requirements.
    Tasks,
    /// Collect a chain snapshot, pick a task, and run it.
    Analyze {
        /// Run a specific task instead of deciding from the data.
        #[arg(long)]
        task: Option<String>,
        /// Emit the full result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Inspect or initialize the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Write a default analyst.toml.
    Init,
}
