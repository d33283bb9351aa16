//! CLI argument definitions using clap derive

use crate::bundler::SourceMapMode;
use crate::cache::RebuildMode;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// rollcache - incremental JavaScript bundle cache
///
/// Maps request paths onto bundle entries and rebuilds outputs only when one
/// of their dependencies changed.
#[derive(Parser, Debug)]
#[command(name = "rollcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "ROLLCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local rollcache.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the bundle for a request path if it is out of date
    Build(RequestArgs),

    /// Report whether the bundle for a request path needs a rebuild
    Check(RequestArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments shared by build and check
#[derive(Parser, Debug)]
pub struct RequestArgs {
    /// Request path, e.g. /js/app.js
    pub path: String,

    /// Request method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Override the configured rebuild policy
    #[arg(long, value_enum)]
    pub rebuild: Option<RebuildMode>,

    /// Override the configured source map mode
    #[arg(long, value_enum)]
    pub source_map: Option<SourceMapMode>,

    /// Print the served bundle to stdout
    #[arg(long)]
    pub stdout: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Create a project-local rollcache.toml
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,

        /// Directory to create the file in (default: current directory)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Set a configuration value in the project-local rollcache.toml
    Set {
        /// Configuration key (e.g., middleware.rebuild)
        key: String,
        /// Value to set
        value: String,
    },
}
