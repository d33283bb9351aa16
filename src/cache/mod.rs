//! Incremental build cache
//!
//! Decides whether a bundle must be rebuilt and makes sure concurrent
//! requests for the same output share a single build.
//!
//! # Decision Matrix
//!
//! | Output | Record | Action |
//! |--------|--------|--------|
//! | yes | yes | Wait on record, compare mtimes; supersede if stale |
//! | no | no | Claim, rebuild |
//! | yes | no | Claim, bundle to learn deps, compare mtimes |
//! | no | pending | Wait on the build in flight |
//! | no | settled | Output was deleted; supersede, rebuild |
//!
//! # Record States
//!
//! | State | Description |
//! |-------|-------------|
//! | Pending | A claimed build is running, waiters block on it |
//! | Resolved | Holds the dependency set of the last good build |
//! | Rejected | Failed or expired; the next request rebuilds |

pub mod decision;
pub mod freshness;
pub mod ledger;

pub use decision::{Decision, DecisionEngine, RebuildMode};
pub use freshness::is_fresh;
pub use ledger::{BuildClaim, BuildRecord, BuildRejection, BuildStatus, DependencySet, Ledger, Slot};
