//! rollcache - incremental JavaScript bundle cache
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use rollcache::cli::args::{ConfigAction, ConfigArgs};
use rollcache::cli::{Cli, Commands};
use rollcache::config::{Config, ConfigManager};
use rollcache::error::{RollcacheError, RollcacheResult};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> RollcacheResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    // Creating a config must work even when the existing one is broken
    if let Commands::Config(
        args @ ConfigArgs {
            action: Some(ConfigAction::Init { .. }),
        },
    ) = cli.command
    {
        let config = Config::default();
        init_logging(cli.verbose, &config);
        return rollcache::cli::commands::config(args, &config, &config_manager).await;
    }

    // Find local config unless --no-local is set
    let local_config_path = if cli.no_local {
        None
    } else {
        let cwd = std::env::current_dir()
            .map_err(|e| RollcacheError::io("getting current directory", e))?;
        ConfigManager::find_local_config(&cwd)
    };

    let config = config_manager
        .load_merged(local_config_path.as_deref())
        .await?;

    init_logging(cli.verbose, &config);
    match local_config_path {
        Some(ref path) => debug!("Using local config: {}", path.display()),
        None if cli.no_local => debug!("Local config discovery disabled (--no-local)"),
        None => debug!("No local config found"),
    }

    match cli.command {
        Commands::Build(args) => rollcache::cli::commands::build(args, &config).await,
        Commands::Check(args) => rollcache::cli::commands::check(args, &config).await,
        Commands::Config(args) => rollcache::cli::commands::config(args, &config, &config_manager).await,
    }
}

/// Initialize logging: 0 = warn, 1 = info, 2+ = debug
fn init_logging(verbose: u8, config: &Config) {
    let level = match (verbose, config.general.verbose) {
        (0, false) => "warn",
        (0, true) | (1, _) => "info",
        _ => "debug",
    };
    let filter = EnvFilter::new(format!("rollcache={}", level));

    if config.general.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(verbose > 1)
            .without_time()
            .init();
    }
}
