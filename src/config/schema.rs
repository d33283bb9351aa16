//! Configuration schema for rollcache
//!
//! Global configuration lives at `~/.config/rollcache/config.toml`; a
//! project-local `rollcache.toml` overrides it key by key.

use crate::bundler::{OutputOptions, ServeMode};
use crate::cache::RebuildMode;
use crate::error::{RollcacheError, RollcacheResult};
use crate::middleware::MiddlewareOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Request routing and serving
    pub middleware: MiddlewareConfig,

    /// Output options handed to the bundler
    pub bundle: OutputOptions,

    /// External bundler
    pub bundler: BundlerConfig,

    /// External minifier
    pub minify: MinifyConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,

    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_format: "text".to_string(),
        }
    }
}

/// How requests map onto sources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MiddlewareMode {
    /// Build `.bundle` entries into `.js` outputs
    #[default]
    Compile,
    /// Build `.js` sources into a cache directory and serve from it
    Polyfill,
}

/// Middleware settings
///
/// Unset options take mode-dependent defaults in [`MiddlewareConfig::resolve`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MiddlewareConfig {
    pub mode: MiddlewareMode,

    /// Directory holding bundle entries (required)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<PathBuf>,

    /// Directory receiving built bundles (default: `src`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest: Option<PathBuf>,

    /// Output directory in polyfill mode (default: "cache")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<PathBuf>,

    /// Base directory for `src` and `dest` (default: current directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// URL prefix stripped before routing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    /// Entry file extension (default: ".bundle", ".js" in polyfill mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_extension: Option<String>,

    /// Rebuild policy
    pub rebuild: RebuildMode,

    /// Serve mode (default: false, true in polyfill mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serve: Option<ServeMode>,

    /// Content type of served bundles
    pub content_type: String,

    /// `Cache-Control: max-age` of served bundles, in seconds
    pub max_age: u64,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            mode: MiddlewareMode::Compile,
            src: None,
            dest: None,
            cache: None,
            root: None,
            prefix: None,
            bundle_extension: None,
            rebuild: RebuildMode::DepsChange,
            serve: None,
            content_type: "application/javascript".to_string(),
            max_age: 0,
        }
    }
}

impl MiddlewareConfig {
    /// Apply mode defaults, resolving a relative `root` against `cwd`
    pub fn resolve(&self, cwd: &Path) -> RollcacheResult<MiddlewareOptions> {
        let src = self
            .src
            .clone()
            .ok_or(RollcacheError::ConfigMissing("middleware.src"))?;
        let root = match &self.root {
            Some(root) => cwd.join(root),
            None => cwd.to_path_buf(),
        };

        let mut options = MiddlewareOptions::new(root, src);
        options.prefix = self.prefix.clone().filter(|p| !p.is_empty());
        options.rebuild = self.rebuild;
        options.content_type = self.content_type.clone();
        options.max_age = self.max_age;

        match self.mode {
            MiddlewareMode::Compile => {
                if let Some(dest) = &self.dest {
                    options.dest = dest.clone();
                }
                options.serve = self.serve.unwrap_or(ServeMode::Never);
                if let Some(ext) = &self.bundle_extension {
                    options.bundle_extension = ext.clone();
                }
            }
            MiddlewareMode::Polyfill => {
                if self.dest.is_some() || self.serve.is_some() || self.bundle_extension.is_some() {
                    warn!("Explicitly setting options of compile mode in polyfill mode");
                }
                options.dest = self
                    .cache
                    .clone()
                    .or_else(|| self.dest.clone())
                    .unwrap_or_else(|| PathBuf::from("cache"));
                options.serve = self.serve.unwrap_or(ServeMode::Always);
                options.bundle_extension = self.bundle_extension.clone().unwrap_or_else(|| ".js".to_string());
            }
        }

        Ok(options)
    }
}

/// External bundler settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BundlerConfig {
    /// Program and arguments; the entry path is appended
    pub command: Vec<String>,
}

/// External minifier settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MinifyConfig {
    /// Run the minifier after bundling
    pub enabled: bool,

    /// Program and arguments; reads JSON on stdin
    pub command: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn middleware(toml: &str) -> MiddlewareConfig {
        toml::from_str::<Config>(toml).unwrap().middleware
    }

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[middleware]"));
        assert!(toml.contains("rebuild = \"deps-change\""));
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [middleware]
            src = "client"

            [bundle]
            source_map = "inline"
            "#,
        )
        .unwrap();

        assert_eq!(config.general.log_format, "text");
        assert_eq!(config.bundle.format, "iife");
        assert_eq!(config.bundle.source_map, crate::bundler::SourceMapMode::Inline);
        assert_eq!(config.middleware.rebuild, RebuildMode::DepsChange);
    }

    #[test]
    fn src_is_required() {
        let err = MiddlewareConfig::default().resolve(Path::new("/site")).unwrap_err();
        assert!(matches!(err, RollcacheError::ConfigMissing("middleware.src")));
    }

    #[test]
    fn compile_mode_defaults() {
        let options = middleware("[middleware]\nsrc = \"client\"")
            .resolve(Path::new("/site"))
            .unwrap();

        assert_eq!(options.root, PathBuf::from("/site"));
        assert_eq!(options.dest, PathBuf::from("client"));
        assert_eq!(options.bundle_extension, ".bundle");
        assert_eq!(options.serve, ServeMode::Never);
    }

    #[test]
    fn polyfill_mode_defaults() {
        let options = middleware("[middleware]\nmode = \"polyfill\"\nsrc = \"client\"")
            .resolve(Path::new("/site"))
            .unwrap();

        assert_eq!(options.dest, PathBuf::from("cache"));
        assert_eq!(options.bundle_extension, ".js");
        assert_eq!(options.serve, ServeMode::Always);
    }

    #[test]
    fn polyfill_mode_explicit_options_win() {
        let options = middleware(
            r#"
            [middleware]
            mode = "polyfill"
            src = "client"
            cache = "tmp/js"
            serve = "on-compile"
            "#,
        )
        .resolve(Path::new("/site"))
        .unwrap();

        assert_eq!(options.dest, PathBuf::from("tmp/js"));
        assert_eq!(options.serve, ServeMode::OnCompile);
    }

    #[test]
    fn relative_root_joins_cwd() {
        let options = middleware("[middleware]\nsrc = \"client\"\nroot = \"web\"\nprefix = \"\"")
            .resolve(Path::new("/site"))
            .unwrap();

        assert_eq!(options.root, PathBuf::from("/site/web"));
        assert_eq!(options.prefix, None);
    }
}
