//! Config command - show or edit configuration

use super::current_dir;
use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager, LOCAL_CONFIG_FILE};
use crate::error::{RollcacheError, RollcacheResult};
use crate::ui::{self, UiContext};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Template for project-local config
const INIT_TEMPLATE: &str = r#"# rollcache project configuration
# Settings here override your global config (~/.config/rollcache/config.toml)

[middleware]
src = "client"
# mode = "compile"            # compile, polyfill
# dest = "static"             # defaults to src
# prefix = "/assets"
# bundle_extension = ".bundle"
# rebuild = "deps-change"     # deps-change, always, never
# serve = false               # false, "on-compile", true

[bundle]
format = "iife"
# name = "app"
# source_map = false          # false, true, "inline"

[bundler]
# Gets the entry as last argument and {"format", "name", "source_map"} on stdin,
# prints {"modules": [...], "code": "...", "map": ...}
command = ["node", "scripts/bundle.js"]

[minify]
enabled = false
# Reads {"code": "...", "inputMap": ...} on stdin
# command = ["node", "scripts/minify.js"]
"#;

/// Keys accepted by `config set`
const VALID_KEYS: &[&str] = &[
    "general.verbose",
    "general.log_format",
    "middleware.mode",
    "middleware.src",
    "middleware.dest",
    "middleware.cache",
    "middleware.root",
    "middleware.prefix",
    "middleware.bundle_extension",
    "middleware.rebuild",
    "middleware.serve",
    "middleware.content_type",
    "middleware.max_age",
    "bundle.format",
    "bundle.name",
    "bundle.source_map",
    "bundler.command",
    "minify.enabled",
    "minify.command",
];

/// Execute the config command
pub async fn execute(args: ConfigArgs, config: &Config, manager: &ConfigManager) -> RollcacheResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => show_path(manager)?,
        Some(ConfigAction::Init { force, dir }) => {
            let dir = match dir {
                Some(dir) => dir,
                None => current_dir()?,
            };
            init_config(&dir, force).await?;
        }
        Some(ConfigAction::Set { key, value }) => {
            let path = current_dir()?.join(LOCAL_CONFIG_FILE);
            set_local_value(&path, &key, &value).await?
        }
    }

    Ok(())
}

fn show_config(config: &Config) -> RollcacheResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn show_path(manager: &ConfigManager) -> RollcacheResult<()> {
    let cwd = current_dir()?;
    println!("{}", manager.path().display());
    if let Some(local) = ConfigManager::find_local_config(&cwd) {
        println!("{}", local.display());
    }
    Ok(())
}

async fn init_config(dir: &Path, force: bool) -> RollcacheResult<PathBuf> {
    let ctx = UiContext::detect();
    let path = dir.join(LOCAL_CONFIG_FILE);

    if path.exists() && !force {
        return Err(RollcacheError::User(format!(
            "{} already exists. Use --force to overwrite.",
            path.display()
        )));
    }

    fs::create_dir_all(dir)
        .await
        .map_err(|e| RollcacheError::io(format!("creating directory {}", dir.display()), e))?;
    fs::write(&path, INIT_TEMPLATE)
        .await
        .map_err(|e| RollcacheError::io(format!("writing {}", path.display()), e))?;

    ui::step_ok_detail(&ctx, "Created project config", &path.display().to_string());
    Ok(path)
}

async fn set_local_value(path: &Path, key: &str, value: &str) -> RollcacheResult<()> {
    let ctx = UiContext::detect();

    if !VALID_KEYS.contains(&key) {
        ui::step_error_detail(&ctx, "Unknown config key", key);
        ui::remark(&ctx, &format!("Valid keys: {}", VALID_KEYS.join(", ")));
        return Err(RollcacheError::User(format!("Unknown config key: {}", key)));
    }

    // Load existing local config or start with an empty TOML table
    let mut doc: toml::Value = if path.exists() {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| RollcacheError::io(format!("reading {}", path.display()), e))?;
        content
            .parse()
            .map_err(|e: toml::de::Error| RollcacheError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
    } else {
        toml::Value::Table(toml::map::Map::new())
    };

    set_toml_value(&mut doc, key, parse_value(key, value))?;

    // Reject values the schema would not load
    let _: Config = doc
        .clone()
        .try_into()
        .map_err(|e: toml::de::Error| RollcacheError::User(format!("Invalid value for {}: {}", key, e)))?;

    let content = toml::to_string_pretty(&doc)?;
    fs::write(path, content)
        .await
        .map_err(|e| RollcacheError::io(format!("writing {}", path.display()), e))?;

    ui::step_ok(&ctx, &format!("Set {} = {} in {}", key, value, path.display()));
    Ok(())
}

/// Set a dot-separated key in a TOML value tree, creating intermediate tables as needed
fn set_toml_value(doc: &mut toml::Value, key: &str, value: toml::Value) -> RollcacheResult<()> {
    let (tables, leaf) = key.rsplit_once('.').unwrap_or(("", key));
    let mut current = doc;

    for part in tables.split('.').filter(|p| !p.is_empty()) {
        current = current
            .as_table_mut()
            .ok_or_else(|| RollcacheError::User(format!("Expected table at key: {}", part)))?
            .entry(part)
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }

    current
        .as_table_mut()
        .ok_or_else(|| RollcacheError::User(format!("Expected table for key: {}", key)))?
        .insert(leaf.to_string(), value);
    Ok(())
}

fn parse_value(key: &str, value: &str) -> toml::Value {
    if key.ends_with(".command") {
        return toml::Value::Array(
            value
                .split_whitespace()
                .map(|s| toml::Value::String(s.to_string()))
                .collect(),
        );
    }

    match value {
        "true" => toml::Value::Boolean(true),
        "false" => toml::Value::Boolean(false),
        _ => match value.parse::<i64>() {
            Ok(n) => toml::Value::Integer(n),
            Err(_) => toml::Value::String(value.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::ServeMode;
    use crate::cache::RebuildMode;
    use tempfile::TempDir;

    #[test]
    fn template_is_valid_config() {
        let config: Config = toml::from_str(INIT_TEMPLATE).unwrap();
        assert_eq!(config.middleware.src, Some(PathBuf::from("client")));
        assert_eq!(config.bundler.command, ["node", "scripts/bundle.js"]);
    }

    #[tokio::test]
    async fn init_creates_config() {
        let temp = TempDir::new().unwrap();

        let path = init_config(temp.path(), false).await.unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("[middleware]"));
        assert!(content.contains("[bundler]"));
    }

    #[tokio::test]
    async fn init_refuses_overwrite_without_force() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(LOCAL_CONFIG_FILE), "existing").unwrap();

        let err = init_config(temp.path(), false).await.unwrap_err();
        assert!(err.to_string().contains("already exists"));

        init_config(temp.path(), true).await.unwrap();
        let content = std::fs::read_to_string(temp.path().join(LOCAL_CONFIG_FILE)).unwrap();
        assert!(content.contains("[middleware]"));
    }

    #[tokio::test]
    async fn set_writes_typed_values() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(LOCAL_CONFIG_FILE);

        set_local_value(&path, "middleware.rebuild", "always").await.unwrap();
        set_local_value(&path, "middleware.serve", "true").await.unwrap();
        set_local_value(&path, "bundler.command", "node bundle.js").await.unwrap();

        let config: Config = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(config.middleware.rebuild, RebuildMode::Always);
        assert_eq!(config.middleware.serve, Some(ServeMode::Always));
        assert_eq!(config.bundler.command, ["node", "bundle.js"]);
    }

    #[tokio::test]
    async fn set_rejects_unknown_keys_and_bad_values() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(LOCAL_CONFIG_FILE);

        assert!(set_local_value(&path, "middleware.colour", "red").await.is_err());
        assert!(set_local_value(&path, "middleware.rebuild", "sometimes").await.is_err());
        assert!(!path.exists());
    }
}
