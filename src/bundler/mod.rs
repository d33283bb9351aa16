//! Bundling engine and minifier abstraction
//!
//! The coordinator never parses or generates code itself. It drives an
//! external bundler through the [`Bundler`] / [`Bundle`] traits and an
//! optional external minifier through [`Minifier`].

pub mod command;

pub use command::{CommandBundler, CommandMinifier};

use crate::error::RollcacheResult;
use async_trait::async_trait;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;

/// Abstract bundling engine
#[async_trait]
pub trait Bundler: Send + Sync {
    /// Bundle the module graph rooted at `entry`
    async fn build(&self, entry: &Path) -> RollcacheResult<Box<dyn Bundle>>;

    /// Human-readable bundler name for logs
    fn name(&self) -> &'static str;
}

/// A bundle produced by a [`Bundler`]
#[async_trait]
pub trait Bundle: Send + Sync {
    /// Ids of every module the bundle resolved, including virtual ones
    fn module_ids(&self) -> Vec<String>;

    /// Generate the bundle's code and source map
    async fn emit(&self, options: &OutputOptions) -> RollcacheResult<EmittedCode>;
}

/// Abstract minifier
#[async_trait]
pub trait Minifier: Send + Sync {
    /// Minify `code`, chaining the input source map when one is given
    async fn minify(&self, code: &str, options: &MinifyOptions) -> RollcacheResult<MinifyOutput>;

    /// Human-readable minifier name for logs
    fn name(&self) -> &'static str;
}

/// Code and optional source map generated from a bundle
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedCode {
    pub code: String,
    pub map: Option<SourceMap>,
}

/// Options for a minifier run
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinifyOptions {
    /// Source map of the code being minified
    pub input_map: Option<SourceMap>,
}

/// Result of a minifier run
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MinifyOutput {
    pub code: String,
    pub map: Option<SourceMap>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

/// A source map, kept as the JSON document the bundler produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceMap(serde_json::Value);

impl SourceMap {
    /// Wrap a parsed source map document
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Serialize the map to JSON
    pub fn to_json(&self) -> String {
        self.0.to_string()
    }

    /// Encode the map as an inline `data:` URL
    pub fn to_url(&self) -> String {
        format!(
            "data:application/json;charset=utf-8;base64,{}",
            BASE64_STANDARD.encode(self.to_json())
        )
    }
}

/// Bundle output options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputOptions {
    /// Output format handed to the bundler (iife, es, cjs, ...)
    pub format: String,

    /// Global name for iife/umd bundles
    pub name: Option<String>,

    /// Source map handling
    pub source_map: SourceMapMode,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            format: "iife".to_string(),
            name: None,
            source_map: SourceMapMode::Off,
        }
    }
}

/// Source map handling, written as `false`, `true` or `"inline"` in config
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceMapMode {
    /// No source map
    #[default]
    Off,
    /// Sibling `.map` file referenced from the bundle
    File,
    /// Base64 data URL appended to the bundle
    Inline,
}

impl SourceMapMode {
    /// Whether a source map should be generated at all
    pub fn enabled(&self) -> bool {
        !matches!(self, Self::Off)
    }
}

impl fmt::Display for SourceMapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Off => "off",
            Self::File => "file",
            Self::Inline => "inline",
        };
        write!(f, "{}", name)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum FlagOrName {
    Flag(bool),
    Name(String),
}

impl Serialize for SourceMapMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Off => FlagOrName::Flag(false),
            Self::File => FlagOrName::Flag(true),
            Self::Inline => FlagOrName::Name("inline".to_string()),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SourceMapMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match FlagOrName::deserialize(deserializer)? {
            FlagOrName::Flag(false) => Ok(Self::Off),
            FlagOrName::Flag(true) => Ok(Self::File),
            FlagOrName::Name(name) if name == "inline" => Ok(Self::Inline),
            FlagOrName::Name(other) => Err(serde::de::Error::custom(format!(
                "unknown source_map mode {:?}, expected false, true or \"inline\"",
                other
            ))),
        }
    }
}

/// Serve behaviour, written as `false`, `true` or `"on-compile"` in config
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ServeMode {
    /// Never serve; always delegate to the next handler
    #[default]
    Never,
    /// Serve the bundle only when it was just compiled
    OnCompile,
    /// Serve compiled bundles and cached artifacts alike
    Always,
}

impl Serialize for ServeMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Never => FlagOrName::Flag(false),
            Self::Always => FlagOrName::Flag(true),
            Self::OnCompile => FlagOrName::Name("on-compile".to_string()),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ServeMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match FlagOrName::deserialize(deserializer)? {
            FlagOrName::Flag(false) => Ok(Self::Never),
            FlagOrName::Flag(true) => Ok(Self::Always),
            FlagOrName::Name(name) if name == "on-compile" => Ok(Self::OnCompile),
            FlagOrName::Name(other) => Err(serde::de::Error::custom(format!(
                "unknown serve mode {:?}, expected false, true or \"on-compile\"",
                other
            ))),
        }
    }
}
