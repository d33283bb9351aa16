//! Rebuild decisions
//!
//! Classifies each request by whether the output exists on disk and whether
//! the ledger already has a record for it, then decides if a rebuild is
//! needed. Rebuild decisions always come with a [`BuildClaim`], so the caller
//! that builds is always the one that claimed the output.

use crate::bundler::{Bundle, Bundler};
use crate::cache::freshness::is_fresh;
use crate::cache::ledger::{BuildClaim, BuildRecord, BuildStatus, DependencySet, Ledger, Slot};
use crate::error::{RollcacheError, RollcacheResult};
use crate::fs::FileSystem;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Attempts before an expiring build is reported to the caller
const MAX_DECISION_ATTEMPTS: usize = 8;

/// Rebuild policy applied on top of the dependency check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RebuildMode {
    /// Rebuild on every request
    Always,
    /// Never rebuild, even when stale
    Never,
    /// Rebuild when the output is missing or older than a dependency
    #[default]
    DepsChange,
}

impl fmt::Display for RebuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Always => "always",
            Self::Never => "never",
            Self::DepsChange => "deps-change",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of a rebuild check
pub struct Decision {
    /// Whether the output must be rebuilt
    pub needed: bool,
    bundle: Option<Box<dyn Bundle>>,
    claim: Option<BuildClaim>,
}

impl Decision {
    fn fresh() -> Self {
        Self {
            needed: false,
            bundle: None,
            claim: None,
        }
    }

    fn rebuild(claim: BuildClaim, bundle: Option<Box<dyn Bundle>>) -> Self {
        Self {
            needed: true,
            bundle,
            claim: Some(claim),
        }
    }

    /// Override `needed` according to `mode`
    ///
    /// Only the reported flag changes; a claim taken while deciding is kept.
    pub fn apply_policy(mut self, mode: RebuildMode) -> Self {
        match mode {
            RebuildMode::Always => self.needed = true,
            RebuildMode::Never => self.needed = false,
            RebuildMode::DepsChange => {}
        }
        self
    }

    /// Bundle loaded while checking dependencies, if any
    pub fn bundle(&self) -> Option<&dyn Bundle> {
        self.bundle.as_deref()
    }

    pub fn take_bundle(&mut self) -> Option<Box<dyn Bundle>> {
        self.bundle.take()
    }

    /// Claim on the output's build record, if this decision took one
    pub fn claim(&self) -> Option<&BuildClaim> {
        self.claim.as_ref()
    }

    pub fn take_claim(&mut self) -> Option<BuildClaim> {
        self.claim.take()
    }
}

impl fmt::Debug for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decision")
            .field("needed", &self.needed)
            .field("bundle", &self.bundle.is_some())
            .field("claim", &self.claim)
            .finish()
    }
}

/// Decides whether outputs need rebuilding
#[derive(Clone)]
pub struct DecisionEngine {
    fs: Arc<dyn FileSystem>,
    bundler: Arc<dyn Bundler>,
    ledger: Arc<Ledger>,
}

impl DecisionEngine {
    pub fn new(fs: Arc<dyn FileSystem>, bundler: Arc<dyn Bundler>, ledger: Arc<Ledger>) -> Self {
        Self { fs, bundler, ledger }
    }

    /// Decide whether `output`, built from `entry`, needs a rebuild
    ///
    /// Returns `Ok(None)` when the entry does not exist, meaning the request
    /// belongs to another handler. A build that expires while this call
    /// waits on it restarts the decision.
    pub async fn decide(&self, output: &Path, entry: &Path) -> RollcacheResult<Option<Decision>> {
        for attempt in 1..=MAX_DECISION_ATTEMPTS {
            match self.decide_once(output, entry).await {
                Err(e) if e.is_retryable() => {
                    debug!(target: "rollcache::check", "Attempt {} for {}: {}", attempt, output.display(), e);
                }
                other => return other,
            }
        }
        Err(RollcacheError::ExpiredBuild(output.to_path_buf()))
    }

    async fn decide_once(&self, output: &Path, entry: &Path) -> RollcacheResult<Option<Decision>> {
        let (entry_exists, output_exists) = tokio::try_join!(self.exists(entry), self.exists(output))?;
        if !entry_exists {
            debug!(target: "rollcache::check", "No source entry at {}", entry.display());
            return Ok(None);
        }
        debug!(target: "rollcache::check", "source: {}", entry.display());
        debug!(target: "rollcache::check", "dest: {}", output.display());

        let decision = match (output_exists, self.ledger.lookup_or_claim(output)) {
            (false, Slot::Claimed(claim)) => {
                debug!(target: "rollcache::check", "Cache miss, no output to compare");
                Decision::rebuild(claim, None)
            }
            (true, Slot::Claimed(claim)) => {
                debug!(target: "rollcache::check", "Cache miss, loading bundle for its dependencies");
                self.probe(claim, output, entry).await?
            }
            (true, Slot::Existing(record)) => self.recheck(record, output).await?,
            (false, Slot::Existing(record)) => self.recover(record, output).await?,
        };
        Ok(Some(decision))
    }

    /// Output exists but nothing is known about it: bundle to learn its deps
    async fn probe(&self, claim: BuildClaim, output: &Path, entry: &Path) -> RollcacheResult<Decision> {
        let bundle = match self.bundler.build(entry).await {
            Ok(bundle) => bundle,
            Err(e) => {
                claim.reject(e.to_string());
                return Err(e);
            }
        };
        debug!(target: "rollcache::check", "Bundle loaded by {}", self.bundler.name());

        let dependencies = DependencySet::from_module_ids(bundle.module_ids());
        match is_fresh(&*self.fs, output, &dependencies).await {
            Ok(true) => {
                claim.resolve(dependencies);
                Ok(Decision::fresh())
            }
            Ok(false) => Ok(Decision::rebuild(claim, Some(bundle))),
            Err(e) => {
                claim.reject(e.to_string());
                Err(e)
            }
        }
    }

    /// Output exists and has a record: compare against the recorded deps
    async fn recheck(&self, record: BuildRecord, output: &Path) -> RollcacheResult<Decision> {
        if record.status() == BuildStatus::Rejected {
            debug!(target: "rollcache::check", "Previous build of {} failed", output.display());
            return self.supersede_stale(&record, output);
        }

        let dependencies = record.wait().await.map_err(|r| r.into_error(output))?;
        if is_fresh(&*self.fs, output, &dependencies).await? {
            debug!(target: "rollcache::check", "Cache hit, {} is fresh", output.display());
            return Ok(Decision::fresh());
        }
        self.supersede_stale(&record, output)
    }

    /// Output is missing but has a record
    async fn recover(&self, record: BuildRecord, output: &Path) -> RollcacheResult<Decision> {
        match record.status() {
            BuildStatus::Pending => {
                debug!(target: "rollcache::check", "Waiting on build in flight for {}", output.display());
                record.wait().await.map_err(|r| r.into_error(output))?;
                Ok(Decision::fresh())
            }
            BuildStatus::Resolved | BuildStatus::Rejected => {
                debug!(target: "rollcache::check", "{} was deleted, rebuilding", output.display());
                self.supersede_stale(&record, output)
            }
        }
    }

    fn supersede_stale(&self, record: &BuildRecord, output: &Path) -> RollcacheResult<Decision> {
        match self.ledger.supersede_if_current(output, record) {
            Some(claim) => Ok(Decision::rebuild(claim, None)),
            // Someone else already started the rebuild; decide again and wait on theirs
            None => Err(RollcacheError::ExpiredBuild(output.to_path_buf())),
        }
    }

    async fn exists(&self, path: &Path) -> RollcacheResult<bool> {
        self.fs
            .exists(path)
            .await
            .map_err(|e| RollcacheError::io(format!("checking {}", path.display()), e))
    }
}
