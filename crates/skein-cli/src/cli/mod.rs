//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use skein_core::{config, logging};

mod commands;
mod render;

#[derive(Parser)]
#[command(name = "skein")]
#[command(version)]
#[command(about = "Assemble Claude CLI stream-json output into transcripts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// How a transcript is printed.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text, one line per block header
    #[default]
    Text,
    /// The block list as JSON
    Json,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Assemble a complete stream-json capture in one pass
    Replay {
        /// Capture to read (default: stdin)
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Assemble a stream-json stream line by line as it arrives
    Follow {
        /// Stream to read (default: stdin)
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

fn load_config() -> Result<config::Config> {
    let config = config::Config::load().context("load config")?;
    logging::init(&config.log).context("init logging")?;
    Ok(config)
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Replay { input, format } => {
            let config = load_config()?;
            commands::replay::run(input.as_deref(), format, &config).await
        }
        Commands::Follow { input, format } => {
            let config = load_config()?;
            commands::follow::run(input.as_deref(), format, &config).await
        }
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
    }
}
