//! rollcache - incremental JavaScript bundle cache
//!
//! Maps bundle requests onto entry and output paths, rebuilds outputs whose
//! dependencies changed, and shares a single build between concurrent
//! requests for the same output.

pub mod build;
pub mod bundler;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fs;
pub mod middleware;
pub mod ui;

#[cfg(test)]
mod testutil;

pub use error::{RollcacheError, RollcacheResult};
