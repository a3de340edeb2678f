// Entrypoint for the CLI application.
// - Keeps `main` small: parse arguments, set up logging, load the config and
//   hand it to the orchestrator.
// - Returns `anyhow::Result` so any fatal error exits with status 1.

use anyhow::Result;
use apigee_migrate::api::ApiClient;
use apigee_migrate::config::MigrationConfig;
use apigee_migrate::migrate::{self, Migration, RunOptions};
use apigee_migrate::staging;
use apigee_migrate::ui::TerminalPrompt;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "apigee-migrate")]
#[command(about = "Apigee Migration CLI Tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Migrate all resources based on the "All" section of the config file
    All {
        /// Path to the config file
        #[arg(long, default_value = "config.json")]
        config: PathBuf,
        /// Only import proxy and shared flow bundles without deploying
        #[arg(long)]
        onlyimport: bool,
        /// Parent of the `fromOrgResources` staging directory
        #[arg(long, env = "APIGEE_MIGRATE_STAGING_DIR")]
        staging_dir: Option<PathBuf>,
        /// Leave the staging directory in place after the run
        #[arg(long)]
        keep_staging: bool,
    },
    /// Migrate specific resources based on the "Specific" section of the config file
    Specific {
        /// Path to the config file
        #[arg(long, default_value = "config.json")]
        config: PathBuf,
    },
}

fn load(path: &Path) -> Result<MigrationConfig> {
    let config = MigrationConfig::load(path)?;
    info!("Loaded configuration: {}", serde_json::to_string_pretty(&config)?);
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("info"),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Command::All {
            config,
            onlyimport,
            staging_dir,
            keep_staging,
        } => {
            let config = load(&config)?;
            let api = ApiClient::from_env()?;
            let options = RunOptions {
                import_only: onlyimport,
                staging_root: staging_dir.unwrap_or_else(staging::default_root),
                keep_staging,
            };
            Migration::new(&api, &TerminalPrompt, &config).run_all(&options)?;
        }
        Command::Specific { config } => {
            let config = load(&config)?;
            migrate::run_specific(&config);
        }
    }
    Ok(())
}
