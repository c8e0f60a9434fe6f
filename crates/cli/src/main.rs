//! treeprice CLI — the main entry point.
//!
//! Commands:
//! - `run`     — Average property prices per tree-size group
//! - `groups`  — List every group with the streets classified into it
//! - `config`  — Print the effective configuration

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use treeprice_config::AppConfig;

mod commands;

use commands::run::{OutputFormat, RunArgs};

#[derive(Parser)]
#[command(
    name = "treeprice",
    about = "treeprice — average property prices per tree-size group",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.treeprice/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Append logs to this file instead of stderr
    #[arg(short, long, global = true)]
    log: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Average prices per group
    Run {
        /// JSON file with streets grouped by tree size
        #[arg(short, long)]
        trees: Option<PathBuf>,

        /// CSV file with property prices
        #[arg(short, long)]
        properties: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Parse prices as floating point instead of exact decimals
        #[arg(long)]
        floats: bool,
    },

    /// List every group with its streets, in document order
    Groups {
        /// JSON file with streets grouped by tree size
        #[arg(short, long)]
        trees: Option<PathBuf>,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::config_path);
    let config = AppConfig::load_with_env(&config_path)
        .map_err(|e| format!("Failed to load config: {e}"))?;

    // Initialize tracing
    let level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let log_file = cli.log.as_deref().or(config.logging.file.as_deref());
    init_tracing(level, log_file)?;

    let result = match cli.command {
        Commands::Run {
            trees,
            properties,
            format,
            floats,
        } => {
            let args = RunArgs {
                trees,
                properties,
                format,
                floats,
            };
            commands::run::run(config, args).await
        }
        Commands::Groups { trees } => commands::groups::run(config, trees).await,
        Commands::Config => commands::config_cmd::show(&config, &config_path),
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "treeprice failed");
    }
    result
}

fn init_tracing(level: &str, log_file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| format!("Failed to open log file {}: {e}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}
