//! CLI command implementations

pub mod build;
pub mod check;
pub mod config;

pub use build::execute as build;
pub use check::execute as check;
pub use config::execute as config;

use crate::bundler::{CommandBundler, CommandMinifier, Minifier, SourceMapMode};
use crate::config::Config;
use crate::error::{RollcacheError, RollcacheResult};
use crate::fs::TokioFs;
use crate::middleware::Coordinator;
use std::path::Path;
use std::sync::Arc;

/// Current working directory
pub(crate) fn current_dir() -> RollcacheResult<std::path::PathBuf> {
    std::env::current_dir().map_err(|e| RollcacheError::io("getting current directory", e))
}

/// Build a coordinator over the real filesystem and the configured commands
pub(crate) fn coordinator(
    config: &Config,
    cwd: &Path,
    source_map: Option<SourceMapMode>,
) -> RollcacheResult<Coordinator> {
    let options = config.middleware.resolve(cwd)?;

    let mut output = config.bundle.clone();
    if let Some(mode) = source_map {
        output.source_map = mode;
    }

    let bundler = Arc::new(CommandBundler::new(&config.bundler.command)?.with_output(output.clone()));
    let minifier = if config.minify.enabled {
        Some(Arc::new(CommandMinifier::new(&config.minify.command)?) as Arc<dyn Minifier>)
    } else {
        None
    };

    Ok(Coordinator::new(options, output, Arc::new(TokioFs), bundler, minifier))
}
