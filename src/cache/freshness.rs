//! Output freshness against a dependency set

use crate::cache::ledger::DependencySet;
use crate::error::{RollcacheError, RollcacheResult};
use crate::fs::{FileState, FileSystem};
use futures_util::future::try_join_all;
use std::path::Path;
use tracing::debug;

async fn stat(fs: &dyn FileSystem, path: &Path) -> RollcacheResult<Option<FileState>> {
    fs.stat(path)
        .await
        .map_err(|e| RollcacheError::io(format!("reading stats of {}", path.display()), e))
}

/// Check that `output` exists and is strictly newer than every dependency
///
/// A missing dependency makes the output stale, exactly like a missing
/// output. Equal modification times are stale too. All paths are stat'ed
/// concurrently; errors other than not-found are returned.
pub async fn is_fresh(
    fs: &dyn FileSystem,
    output: &Path,
    dependencies: &DependencySet,
) -> RollcacheResult<bool> {
    let (output_state, dep_states) = tokio::try_join!(
        stat(fs, output),
        try_join_all(dependencies.iter().map(|dep| stat(fs, dep)))
    )?;

    let Some(output_state) = output_state else {
        debug!(target: "rollcache::check", "Output {} does not exist", output.display());
        return Ok(false);
    };
    debug!(target: "rollcache::check", "Stats loaded, {} dependencies", dep_states.len());

    for (dep, state) in dependencies.iter().zip(dep_states) {
        match state {
            None => {
                debug!(target: "rollcache::check", "Dependency {} no longer exists", dep.display());
                return Ok(false);
            }
            Some(state) if state.modified >= output_state.modified => {
                debug!(target: "rollcache::check", "Dependency {} is newer", dep.display());
                return Ok(false);
            }
            Some(_) => {}
        }
    }

    Ok(true)
}
