//! Request coordination
//!
//! The [`Coordinator`] ties routing, the rebuild decision, the rebuild
//! policy and the build executor together. It owns the [`Ledger`] for its
//! outputs; HTTP integrations hand it requests and act on the returned
//! [`Outcome`].

pub mod route;

pub use route::{resolve, Request};

use crate::build::{BuildTarget, Executor};
use crate::bundler::{Bundler, Minifier, OutputOptions, ServeMode};
use crate::cache::{Decision, DecisionEngine, Ledger, RebuildMode};
use crate::error::{RollcacheError, RollcacheResult};
use crate::fs::FileSystem;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolved middleware options
#[derive(Debug, Clone, PartialEq)]
pub struct MiddlewareOptions {
    /// Base directory for `src` and `dest`
    pub root: PathBuf,
    /// Directory holding bundle entries
    pub src: PathBuf,
    /// Directory receiving built bundles
    pub dest: PathBuf,
    /// URL prefix stripped before routing
    pub prefix: Option<String>,
    /// Extension of entry files, replacing `.js`
    pub bundle_extension: String,
    pub rebuild: RebuildMode,
    pub serve: ServeMode,
    /// Content type of served bundles
    pub content_type: String,
    /// `max-age` of served bundles, in seconds
    pub max_age: u64,
}

impl MiddlewareOptions {
    /// Compile-mode defaults for `src` under `root`, building into `src`
    pub fn new(root: impl Into<PathBuf>, src: impl Into<PathBuf>) -> Self {
        let src = src.into();
        Self {
            root: root.into(),
            dest: src.clone(),
            src,
            prefix: None,
            bundle_extension: ".bundle".to_string(),
            rebuild: RebuildMode::default(),
            serve: ServeMode::default(),
            content_type: "application/javascript".to_string(),
            max_age: 0,
        }
    }
}

/// A response served by the coordinator itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub body: Vec<u8>,
    pub content_type: String,
    pub cache_control: String,
}

/// What the HTTP layer should do with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Send this response
    Served(Response),
    /// Pass the request on to the next handler
    Delegate,
}

/// Result of processing one build target
#[derive(Debug)]
pub struct Processed {
    pub outcome: Outcome,
    /// Whether this call built the output
    pub rebuilt: bool,
}

impl Processed {
    fn delegate(rebuilt: bool) -> Self {
        Self {
            outcome: Outcome::Delegate,
            rebuilt,
        }
    }
}

/// Serves bundle requests, rebuilding outputs as needed
pub struct Coordinator {
    fs: Arc<dyn FileSystem>,
    ledger: Arc<Ledger>,
    engine: DecisionEngine,
    executor: Executor,
    options: MiddlewareOptions,
    output: OutputOptions,
}

impl Coordinator {
    pub fn new(
        options: MiddlewareOptions,
        output: OutputOptions,
        fs: Arc<dyn FileSystem>,
        bundler: Arc<dyn Bundler>,
        minifier: Option<Arc<dyn Minifier>>,
    ) -> Self {
        let ledger = Arc::new(Ledger::new());
        Self {
            engine: DecisionEngine::new(fs.clone(), bundler.clone(), ledger.clone()),
            executor: Executor::new(fs.clone(), bundler, minifier),
            fs,
            ledger,
            options,
            output,
        }
    }

    pub fn options(&self) -> &MiddlewareOptions {
        &self.options
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Build target for `request`, if it is a bundle request
    pub fn route(&self, request: &Request) -> Option<BuildTarget> {
        resolve(&self.options, &self.output, request)
    }

    /// Handle an HTTP request
    pub async fn handle(&self, request: &Request) -> RollcacheResult<Outcome> {
        let Some(target) = self.route(request) else {
            return Ok(Outcome::Delegate);
        };
        let processed = self.process(&target, self.options.rebuild).await?;
        Ok(processed.map_or(Outcome::Delegate, |p| p.outcome))
    }

    /// Decide whether `target` needs a rebuild under `rebuild`
    ///
    /// Returns `None` when the entry does not exist. Ledger bookkeeping
    /// happens regardless of the policy.
    pub async fn check(&self, target: &BuildTarget, rebuild: RebuildMode) -> RollcacheResult<Option<Decision>> {
        let decision = self.engine.decide(&target.dest, &target.entry).await?;
        Ok(decision.map(|d| d.apply_policy(rebuild)))
    }

    /// Check `target`, rebuild it when needed, and pick the outcome
    ///
    /// Returns `None` when the entry does not exist.
    pub async fn process(&self, target: &BuildTarget, rebuild: RebuildMode) -> RollcacheResult<Option<Processed>> {
        let Some(mut decision) = self.check(target, rebuild).await? else {
            return Ok(None);
        };
        debug!(target: "rollcache::check", "Needs rebuild: {}", decision.needed);

        if !decision.needed {
            if let Some(claim) = decision.take_claim() {
                debug!(target: "rollcache::check", "Skipping build of {} by policy", target.dest.display());
                claim.expire();
            }
            return self.serve_cached(target).await.map(Some);
        }

        let claim = match decision.take_claim() {
            Some(claim) => claim,
            None if rebuild == RebuildMode::Always => self.ledger.supersede(&target.dest),
            None => {
                return Err(RollcacheError::InvariantViolation(format!(
                    "rebuild of {} decided without a claim",
                    target.dest.display()
                )))
            }
        };

        let artifact = self.executor.execute(claim, decision.take_bundle(), target).await?;
        match self.options.serve {
            ServeMode::Never => {
                debug!(target: "rollcache::serve", "Serving {} by next handler", target.dest.display());
                Ok(Some(Processed::delegate(true)))
            }
            ServeMode::OnCompile | ServeMode::Always => {
                info!(target: "rollcache::serve", "Serving {}", target.dest.display());
                Ok(Some(Processed {
                    outcome: Outcome::Served(self.response(artifact.code.into_bytes())),
                    rebuilt: true,
                }))
            }
        }
    }

    async fn serve_cached(&self, target: &BuildTarget) -> RollcacheResult<Processed> {
        if self.options.serve != ServeMode::Always {
            debug!(target: "rollcache::serve", "Serving {} by next handler", target.dest.display());
            return Ok(Processed::delegate(false));
        }

        match self.fs.read(&target.dest).await {
            Ok(body) => {
                debug!(target: "rollcache::serve", "Serving {} from cache", target.dest.display());
                Ok(Processed {
                    outcome: Outcome::Served(self.response(body)),
                    rebuilt: false,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(target: "rollcache::serve", "No cached bundle at {}", target.dest.display());
                Ok(Processed::delegate(false))
            }
            Err(e) => Err(RollcacheError::io(format!("reading {}", target.dest.display()), e)),
        }
    }

    fn response(&self, body: Vec<u8>) -> Response {
        Response {
            body,
            content_type: self.options.content_type.clone(),
            cache_control: format!("max-age={}", self.options.max_age),
        }
    }
}
