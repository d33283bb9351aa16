//! Configuration management for rollcache

pub mod schema;

pub use schema::{BundlerConfig, Config, GeneralConfig, MiddlewareConfig, MiddlewareMode, MinifyConfig};

use crate::error::{RollcacheError, RollcacheResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Name of the project-local config file
pub const LOCAL_CONFIG_FILE: &str = "rollcache.toml";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rollcache")
            .join("config.toml")
    }

    /// Walk up from `start` looking for a project-local config file
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(LOCAL_CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Load configuration, falling back to defaults if missing
    pub async fn load(&self) -> RollcacheResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> RollcacheResult<Config> {
        let value = read_table(path).await?;
        value.try_into().map_err(|e: toml::de::Error| RollcacheError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load the global config with a project-local file layered on top
    ///
    /// Tables merge key by key; any other value in the local file replaces
    /// the global one.
    pub async fn load_merged(&self, local: Option<&Path>) -> RollcacheResult<Config> {
        let Some(local) = local else {
            return self.load().await;
        };

        let mut merged = if self.config_path.exists() {
            read_table(&self.config_path).await?
        } else {
            toml::Value::Table(toml::map::Map::new())
        };
        merge_values(&mut merged, read_table(local).await?);

        merged.try_into().map_err(|e: toml::de::Error| RollcacheError::ConfigInvalid {
            path: local.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> RollcacheResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            RollcacheError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> RollcacheResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| RollcacheError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_table(path: &Path) -> RollcacheResult<toml::Value> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| RollcacheError::io(format!("reading config from {}", path.display()), e))?;

    content
        .parse()
        .map_err(|e: toml::de::Error| RollcacheError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::SourceMapMode;
    use crate::cache::RebuildMode;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.toml");
        let manager = ConfigManager::with_path(path);

        let config = manager.load().await.unwrap();
        assert_eq!(config.bundle.format, "iife");
        assert!(config.middleware.src.is_none());
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/config.toml");
        let manager = ConfigManager::with_path(path);

        let mut config = Config::default();
        config.middleware.src = Some(PathBuf::from("client"));
        config.middleware.rebuild = RebuildMode::Always;

        manager.save(&config).await.unwrap();
        let loaded = manager.load().await.unwrap();

        assert_eq!(loaded.middleware.src, Some(PathBuf::from("client")));
        assert_eq!(loaded.middleware.rebuild, RebuildMode::Always);
    }

    #[tokio::test]
    async fn invalid_config_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[middleware]\nrebuild = \"sometimes\"").unwrap();

        let err = ConfigManager::with_path(path).load().await.unwrap_err();
        assert!(matches!(err, RollcacheError::ConfigInvalid { .. }));
    }

    #[tokio::test]
    async fn local_config_overrides_global_keys() {
        let temp = TempDir::new().unwrap();
        let global = temp.path().join("global.toml");
        std::fs::write(
            &global,
            "[middleware]\nsrc = \"client\"\nrebuild = \"never\"\n\n[bundle]\nformat = \"es\"",
        )
        .unwrap();
        let local = temp.path().join(LOCAL_CONFIG_FILE);
        std::fs::write(&local, "[middleware]\nrebuild = \"always\"\n\n[bundle]\nsource_map = true").unwrap();

        let config = ConfigManager::with_path(global)
            .load_merged(Some(&local))
            .await
            .unwrap();

        assert_eq!(config.middleware.src, Some(PathBuf::from("client")));
        assert_eq!(config.middleware.rebuild, RebuildMode::Always);
        assert_eq!(config.bundle.format, "es");
        assert_eq!(config.bundle.source_map, SourceMapMode::File);
    }

    #[test]
    fn finds_local_config_in_ancestor() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(temp.path().join(LOCAL_CONFIG_FILE), "").unwrap();

        let found = ConfigManager::find_local_config(&nested).unwrap();
        assert_eq!(found, temp.path().join(LOCAL_CONFIG_FILE));
    }
}
