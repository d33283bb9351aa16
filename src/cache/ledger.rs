//! In-memory ledger of build records, keyed by output path
//!
//! Each record is the consumer side of a single-writer, multi-reader
//! `tokio::sync::watch` channel. The producer side is a [`BuildClaim`],
//! handed to exactly one caller when a record is installed. Every mutation
//! of the map happens under one mutex that is never held across an `.await`,
//! so check-then-install is atomic and at most one record per output path is
//! ever pending.

use crate::error::RollcacheError;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::debug;

/// Absolute source paths read by one build of an output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet(BTreeSet<PathBuf>);

impl DependencySet {
    /// Collect the absolute paths from a bundle's module ids
    ///
    /// Virtual modules (`\0helper` and the like) have no file behind them
    /// and are skipped.
    pub fn from_module_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ids.into_iter()
            .map(|id| PathBuf::from(id.as_ref()))
            .filter(|path| path.is_absolute())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.0.iter().map(PathBuf::as_path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.0.contains(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<PathBuf> for DependencySet {
    fn from_iter<T: IntoIterator<Item = PathBuf>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Lifecycle status of a build record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Pending,
    Resolved,
    Rejected,
}

/// Why a build record was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildRejection {
    /// Superseded or abandoned before it completed
    Expired,
    /// The build itself failed
    Failed(String),
}

impl BuildRejection {
    /// Convert into the error reported for `output`
    pub fn into_error(self, output: &Path) -> RollcacheError {
        match self {
            Self::Expired => RollcacheError::ExpiredBuild(output.to_path_buf()),
            Self::Failed(reason) => RollcacheError::BuildFailed {
                path: output.to_path_buf(),
                reason,
            },
        }
    }
}

#[derive(Debug, Clone)]
enum BuildState {
    Pending,
    Resolved(Arc<DependencySet>),
    Rejected(BuildRejection),
}

impl BuildState {
    fn status(&self) -> BuildStatus {
        match self {
            Self::Pending => BuildStatus::Pending,
            Self::Resolved(_) => BuildStatus::Resolved,
            Self::Rejected(_) => BuildStatus::Rejected,
        }
    }
}

/// Settle a pending state; settled states never change again
fn settle(state: &watch::Sender<BuildState>, next: BuildState) -> bool {
    state.send_if_modified(|current| {
        if matches!(current, BuildState::Pending) {
            *current = next;
            true
        } else {
            false
        }
    })
}

/// Consumer handle on an output's most recent build attempt
#[derive(Debug, Clone)]
pub struct BuildRecord {
    state: Arc<watch::Sender<BuildState>>,
}

impl BuildRecord {
    /// Create a pending record and the claim that will settle it
    pub fn pending(output: impl Into<PathBuf>) -> (Self, BuildClaim) {
        let (tx, _) = watch::channel(BuildState::Pending);
        let state = Arc::new(tx);
        let claim = BuildClaim {
            output: output.into(),
            state: Arc::clone(&state),
            settled: false,
        };
        (Self { state }, claim)
    }

    /// Create a record that is already resolved with `dependencies`
    pub fn resolved(dependencies: DependencySet) -> Self {
        let (tx, _) = watch::channel(BuildState::Resolved(Arc::new(dependencies)));
        Self {
            state: Arc::new(tx),
        }
    }

    pub fn status(&self) -> BuildStatus {
        self.state.borrow().status()
    }

    /// Wait until the record settles
    ///
    /// Resolves immediately for records that are already settled.
    pub async fn wait(&self) -> Result<Arc<DependencySet>, BuildRejection> {
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(|state| !matches!(state, BuildState::Pending))
            .await
            .map_err(|_| BuildRejection::Expired)?;

        match &*state {
            BuildState::Resolved(deps) => Ok(Arc::clone(deps)),
            BuildState::Rejected(rejection) => Err(rejection.clone()),
            BuildState::Pending => Err(BuildRejection::Expired),
        }
    }

    /// Whether both handles refer to the same build attempt
    pub fn same_build(&self, other: &BuildRecord) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    fn expire(&self) -> bool {
        settle(&self.state, BuildState::Rejected(BuildRejection::Expired))
    }
}

/// Producer handle for a pending build record
///
/// Holding a claim is the right to build one output. Resolving or
/// rejecting it wakes every request waiting on the record; dropping it
/// unsettled expires the record so no waiter hangs.
#[derive(Debug)]
pub struct BuildClaim {
    output: PathBuf,
    state: Arc<watch::Sender<BuildState>>,
    settled: bool,
}

impl BuildClaim {
    /// Output path this claim builds
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Consumer view of the claimed record
    pub fn record(&self) -> BuildRecord {
        BuildRecord {
            state: Arc::clone(&self.state),
        }
    }

    /// Complete the build with its dependency set
    pub fn resolve(mut self, dependencies: DependencySet) {
        let count = dependencies.len();
        if self.settle(BuildState::Resolved(Arc::new(dependencies))) {
            debug!(target: "rollcache::check", "Resolved {} with {} dependencies", self.output.display(), count);
        } else {
            debug!(target: "rollcache::check", "Build for {} finished after it was superseded", self.output.display());
        }
    }

    /// Fail the build; waiters receive `reason`
    pub fn reject(mut self, reason: impl Into<String>) {
        self.settle(BuildState::Rejected(BuildRejection::Failed(reason.into())));
    }

    /// Give the build up; waiters are told to decide again
    pub fn expire(mut self) {
        self.settle(BuildState::Rejected(BuildRejection::Expired));
    }

    fn settle(&mut self, next: BuildState) -> bool {
        self.settled = true;
        settle(&self.state, next)
    }
}

impl Drop for BuildClaim {
    fn drop(&mut self) {
        if !self.settled && settle(&self.state, BuildState::Rejected(BuildRejection::Expired)) {
            debug!(target: "rollcache::check", "Claim for {} dropped unsettled", self.output.display());
        }
    }
}

/// Result of [`Ledger::lookup_or_claim`]
#[derive(Debug)]
pub enum Slot {
    /// A record already exists for the output
    Existing(BuildRecord),
    /// No record existed; the caller now owns a fresh pending one
    Claimed(BuildClaim),
}

/// Process-lifetime map from output path to its latest build record
#[derive(Debug, Default)]
pub struct Ledger {
    records: Mutex<HashMap<PathBuf, BuildRecord>>,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the record for an output
    pub fn get(&self, output: &Path) -> Option<BuildRecord> {
        self.records().get(output).cloned()
    }

    /// Install a record, expiring a pending record it replaces
    pub fn put(&self, output: impl Into<PathBuf>, record: BuildRecord) {
        Self::install(&mut self.records(), output.into(), record);
    }

    /// Retire the current record and claim a fresh pending one
    ///
    /// Waiters on a pending record being replaced receive
    /// [`BuildRejection::Expired`].
    pub fn supersede(&self, output: &Path) -> BuildClaim {
        let (record, claim) = BuildRecord::pending(output);
        Self::install(&mut self.records(), output.to_path_buf(), record);
        claim
    }

    /// Return the existing record, or claim a fresh one if there is none
    pub fn lookup_or_claim(&self, output: &Path) -> Slot {
        let mut records = self.records();
        if let Some(record) = records.get(output) {
            return Slot::Existing(record.clone());
        }
        let (record, claim) = BuildRecord::pending(output);
        records.insert(output.to_path_buf(), record);
        Slot::Claimed(claim)
    }

    /// Supersede `observed` only if it is still the current record
    ///
    /// Returns `None` when another caller replaced it first; the caller
    /// should then piggyback on that build instead of starting another.
    pub fn supersede_if_current(&self, output: &Path, observed: &BuildRecord) -> Option<BuildClaim> {
        let mut records = self.records();
        let is_current = records
            .get(output)
            .is_some_and(|current| current.same_build(observed));
        if !is_current {
            return None;
        }

        let (record, claim) = BuildRecord::pending(output);
        Self::install(&mut records, output.to_path_buf(), record);
        Some(claim)
    }

    /// Number of outputs with a record
    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    fn install(records: &mut HashMap<PathBuf, BuildRecord>, output: PathBuf, record: BuildRecord) {
        if let Some(previous) = records.insert(output.clone(), record) {
            if previous.expire() {
                debug!(target: "rollcache::check", "Expired pending build for {}", output.display());
            }
        }
    }

    fn records(&self) -> MutexGuard<'_, HashMap<PathBuf, BuildRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
