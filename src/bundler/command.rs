//! External command adapters for the bundler and minifier
//!
//! Both adapters speak JSON over stdio. The bundler is invoked as
//! `<command...> <entry>`, receives its [`OutputOptions`] as
//! `{"format": "...", "name": "..." | null, "source_map": false | true | "inline"}`
//! on stdin and must print
//! `{"modules": [...], "code": "...", "map": {...} | null}`.
//! The minifier receives `{"code": "...", "inputMap": ...}` on stdin and
//! prints a [`MinifyOutput`] document.

use super::{Bundle, Bundler, EmittedCode, Minifier, MinifyOptions, MinifyOutput, OutputOptions, SourceMap};
use crate::error::{RollcacheError, RollcacheResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Bundler that shells out to an external command
#[derive(Debug, Clone)]
pub struct CommandBundler {
    command: ExternalCommand,
    output: OutputOptions,
}

impl CommandBundler {
    /// Create a bundler from a command line (program followed by arguments)
    pub fn new(command: &[String]) -> RollcacheResult<Self> {
        Ok(Self {
            command: ExternalCommand::new(command, "bundler.command")?,
            output: OutputOptions::default(),
        })
    }

    /// Output options sent to the command when building
    pub fn with_output(mut self, output: OutputOptions) -> Self {
        self.output = output;
        self
    }
}

#[derive(Debug, Deserialize)]
struct BundlerReport {
    modules: Vec<String>,
    code: String,
    #[serde(default)]
    map: Option<SourceMap>,
}

/// Run the bundler command for `entry` with `options` on stdin
async fn run_bundler(command: &ExternalCommand, entry: &Path, options: &OutputOptions) -> RollcacheResult<BundlerReport> {
    let mut input = serde_json::to_vec(options)?;
    input.push(b'\n');
    let output = command.run(Some(entry), &input).await?;

    let failed = |reason: String| RollcacheError::BundleFailed {
        entry: entry.to_path_buf(),
        reason,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(failed(stderr.trim().to_string()));
    }

    serde_json::from_slice(&output.stdout).map_err(|e| failed(format!("invalid bundler output: {}", e)))
}

/// Bundle whose code was already generated by the external command
#[derive(Debug)]
struct CommandBundle {
    command: ExternalCommand,
    entry: PathBuf,
    /// Options the report was generated with
    options: OutputOptions,
    report: BundlerReport,
}

#[async_trait]
impl Bundle for CommandBundle {
    fn module_ids(&self) -> Vec<String> {
        self.report.modules.clone()
    }

    async fn emit(&self, options: &OutputOptions) -> RollcacheResult<EmittedCode> {
        if options.format != self.options.format
            || options.name != self.options.name
            || (options.source_map.enabled() && !self.options.source_map.enabled())
        {
            debug!("Output options changed, re-running bundler for {}", self.entry.display());
            let report = run_bundler(&self.command, &self.entry, options).await?;
            return Ok(EmittedCode {
                code: report.code,
                map: report.map.filter(|_| options.source_map.enabled()),
            });
        }

        Ok(EmittedCode {
            code: self.report.code.clone(),
            map: self
                .report
                .map
                .clone()
                .filter(|_| options.source_map.enabled()),
        })
    }
}

#[async_trait]
impl Bundler for CommandBundler {
    async fn build(&self, entry: &Path) -> RollcacheResult<Box<dyn Bundle>> {
        let report = run_bundler(&self.command, entry, &self.output).await?;

        Ok(Box::new(CommandBundle {
            command: self.command.clone(),
            entry: entry.to_path_buf(),
            options: self.output.clone(),
            report,
        }))
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

/// Minifier that shells out to an external command
#[derive(Debug, Clone)]
pub struct CommandMinifier {
    command: ExternalCommand,
}

impl CommandMinifier {
    /// Create a minifier from a command line (program followed by arguments)
    pub fn new(command: &[String]) -> RollcacheResult<Self> {
        Ok(Self {
            command: ExternalCommand::new(command, "minify.command")?,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MinifyRequest<'a> {
    code: &'a str,
    #[serde(flatten)]
    options: &'a MinifyOptions,
}

#[async_trait]
impl Minifier for CommandMinifier {
    async fn minify(&self, code: &str, options: &MinifyOptions) -> RollcacheResult<MinifyOutput> {
        let request = serde_json::to_vec(&MinifyRequest { code, options })?;
        let output = self.command.run(None, &request).await?;

        let failed = |reason: String| MinifyOutput {
            error: Some(reason),
            ..MinifyOutput::default()
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Ok(failed(stderr.trim().to_string()));
        }

        Ok(serde_json::from_slice(&output.stdout)
            .unwrap_or_else(|e| failed(format!("invalid minifier output: {}", e))))
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

/// A configured program and its leading arguments
#[derive(Debug, Clone)]
struct ExternalCommand {
    program: String,
    args: Vec<String>,
}

impl ExternalCommand {
    fn new(command: &[String], key: &'static str) -> RollcacheResult<Self> {
        let (program, args) = command.split_first().ok_or(RollcacheError::ConfigMissing(key))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    /// Run the command with `input` on stdin, collecting stdout and stderr
    ///
    /// Stdin is fed while the output pipes are drained.
    async fn run(&self, extra: Option<&Path>, input: &[u8]) -> RollcacheResult<Output> {
        debug!("Executing: {} {:?} {:?}", self.program, self.args, extra);

        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(extra) = extra {
            command.arg(extra);
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RollcacheError::command_failed(&self.program, e))?;

        let stdin = child.stdin.take();
        let feed = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(input).await {
                // The command may exit without reading its input
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                result => result,
            }
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        fed.map_err(|e| RollcacheError::command_failed(&self.program, e))?;
        output.map_err(|e| RollcacheError::command_failed(&self.program, e))
    }
}
