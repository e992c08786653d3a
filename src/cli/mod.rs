//! CLI module for Steve's Mom
//!
//! Provides commands:
//! - `policy`: Print the default routing policy resolved from the environment
//! - `check-config`: Validate a router configuration file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod check_config;
pub mod policy;

/// Steve's Mom CLI
#[derive(Parser, Debug)]
#[command(name = "stevesmom")]
#[command(about = "Resilient multi-provider LLM routing")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the env-resolved default routing policy as JSON
    Policy,
    /// Parse and validate a router configuration JSON file
    CheckConfig {
        /// Path to the configuration file
        file: PathBuf,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Policy) => policy::run(),
        Some(Commands::CheckConfig { file }) => check_config::run(&file).await,
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}
