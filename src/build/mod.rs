//! Build execution
//!
//! Runs the bundler (unless the decision already loaded a bundle), the
//! optional minifier, and the writer, then settles the build claim so every
//! request waiting on this output sees the result.

pub mod writer;

pub use writer::{map_path, write_bundle};

use crate::bundler::{Bundle, Bundler, EmittedCode, Minifier, MinifyOptions, OutputOptions};
use crate::cache::{BuildClaim, DependencySet};
use crate::error::{RollcacheError, RollcacheResult};
use crate::fs::FileSystem;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What to build and where to put it
#[derive(Debug, Clone, PartialEq)]
pub struct BuildTarget {
    /// Source entry handed to the bundler
    pub entry: PathBuf,
    /// Output artifact path
    pub dest: PathBuf,
    /// Output options handed to the bundle
    pub output: OutputOptions,
}

/// A successfully written bundle
#[derive(Debug, Clone)]
pub struct BuiltArtifact {
    /// Code as written to disk
    pub code: String,
    /// Files the bundle was built from
    pub dependencies: DependencySet,
}

/// Runs builds for claimed outputs
#[derive(Clone)]
pub struct Executor {
    fs: Arc<dyn FileSystem>,
    bundler: Arc<dyn Bundler>,
    minifier: Option<Arc<dyn Minifier>>,
}

impl Executor {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        bundler: Arc<dyn Bundler>,
        minifier: Option<Arc<dyn Minifier>>,
    ) -> Self {
        Self {
            fs,
            bundler,
            minifier,
        }
    }

    /// Build `target` under `claim`
    ///
    /// Reuses `bundle` when the rebuild check already loaded one. The claim
    /// is resolved with the new dependency set on success and rejected with
    /// the error message on failure.
    pub async fn execute(
        &self,
        claim: BuildClaim,
        bundle: Option<Box<dyn Bundle>>,
        target: &BuildTarget,
    ) -> RollcacheResult<BuiltArtifact> {
        info!(target: "rollcache::build", "Rolling up {}", target.entry.display());

        match self.run(bundle, target).await {
            Ok(artifact) => {
                info!(target: "rollcache::build", "Wrote {}", target.dest.display());
                claim.resolve(artifact.dependencies.clone());
                Ok(artifact)
            }
            Err(e) => {
                warn!(target: "rollcache::build", "Build of {} failed: {}", target.dest.display(), e);
                claim.reject(e.to_string());
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        bundle: Option<Box<dyn Bundle>>,
        target: &BuildTarget,
    ) -> RollcacheResult<BuiltArtifact> {
        let bundle = match bundle {
            Some(bundle) => {
                debug!(target: "rollcache::build", "Reusing bundle loaded during check");
                bundle
            }
            None => self.bundler.build(&target.entry).await?,
        };

        let dependencies = DependencySet::from_module_ids(bundle.module_ids());
        let mut emitted = bundle.emit(&target.output).await?;
        debug!(target: "rollcache::build", "Rolling up finished");

        if let Some(minifier) = &self.minifier {
            emitted = self.minify(minifier.as_ref(), emitted, target).await?;
        }

        let code = write_bundle(&*self.fs, &emitted, &target.dest, target.output.source_map).await?;
        Ok(BuiltArtifact { code, dependencies })
    }

    async fn minify(
        &self,
        minifier: &dyn Minifier,
        emitted: EmittedCode,
        target: &BuildTarget,
    ) -> RollcacheResult<EmittedCode> {
        debug!(target: "rollcache::build", "Minifying with {}", minifier.name());

        let options = MinifyOptions {
            input_map: emitted.map,
        };
        let output = minifier.minify(&emitted.code, &options).await?;

        if let Some(reason) = output.error {
            return Err(RollcacheError::MinifyFailed {
                dest: target.dest.clone(),
                reason,
            });
        }
        for warning in &output.warnings {
            warn!(target: "rollcache::build", "{}: {}", target.dest.display(), warning);
        }

        Ok(EmittedCode {
            code: output.code,
            map: output.map,
        })
    }
}
