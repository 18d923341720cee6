use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use production_orders::config::{AppConfig, CONFIG_FILE};
use production_orders::telemetry;

mod cmd;

#[derive(Parser)]
#[command(name = "production-orders")]
#[command(version, about = "Production order tracker for injection, slush and spray departments")]
pub struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the config file
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    pub config: PathBuf,

    /// Override the data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Enable dev mode (CORS permissive for local front-end dev servers)
        #[arg(long)]
        dev: bool,

        /// Open the engineering page in a browser after start-up
        #[arg(long)]
        open: bool,
    },
    /// Write a fresh data file seeded with the default material prices
    Init {
        /// Overwrite an existing data file
        #[arg(long)]
        force: bool,
    },
    /// Print order counts per department and status
    Stats,
}

/// Resolve configuration: file, then environment, then global CLI flags.
/// Returns the config plus any warnings, to be logged once tracing is up.
fn resolve_config(cli: &Cli) -> Result<(AppConfig, Vec<String>)> {
    let mut config = AppConfig::load_or_default(&cli.config)?;
    let mut warnings = config.apply_env(|key| std::env::var(key).ok());
    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = dir.clone();
    }
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    warnings.extend(config.validate());
    Ok((config, warnings))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let (config, warnings) = resolve_config(&cli)?;
    telemetry::init_tracing(&config.logging.level, config.logging.json);
    for warning in warnings {
        tracing::warn!("{}", warning);
    }

    match &cli.command {
        Commands::Serve {
            port,
            host,
            dev,
            open,
        } => cmd::cmd_serve(config, *port, host.clone(), *dev, *open).await?,
        Commands::Init { force } => cmd::cmd_init(&config, *force)?,
        Commands::Stats => cmd::cmd_stats(&config)?,
    }

    Ok(())
}
