//! Error types for rollcache
//!
//! All modules use `RollcacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for rollcache operations
pub type RollcacheResult<T> = Result<T, RollcacheError>;

/// All errors that can occur in rollcache
#[derive(Error, Debug)]
pub enum RollcacheError {
    // Build errors
    #[error("Bundling {entry} failed: {reason}")]
    BundleFailed { entry: PathBuf, reason: String },

    #[error("Minifying {dest} failed: {reason}")]
    MinifyFailed { dest: PathBuf, reason: String },

    #[error("Failed to write {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    /// The build this request was waiting on was superseded by a newer one.
    #[error("Build for {0} expired before it completed")]
    ExpiredBuild(PathBuf),

    /// A build another request was running for this output failed.
    #[error("Build for {path} failed: {reason}")]
    BuildFailed { path: PathBuf, reason: String },

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Missing required option: {0}")]
    ConfigMissing(&'static str),

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // User errors
    #[error("{0}")]
    User(String),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl RollcacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a write failure for an output artifact
    pub fn write(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Check if the whole rebuild decision should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExpiredBuild(_))
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ConfigMissing("middleware.src") => {
                Some("Set [middleware] src in rollcache.toml, or run: rollcache config init")
            }
            Self::ConfigMissing("bundler.command") => {
                Some("Set [bundler] command in rollcache.toml, e.g. command = [\"node\", \"bundle.js\"]")
            }
            Self::CommandFailed { .. } => Some("Check the [bundler] and [minify] commands"),
            Self::InvariantViolation(_) => Some("This is a bug in rollcache, please report it"),
            _ => None,
        }
    }
}
