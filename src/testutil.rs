//! Test doubles for the bundler and minifier

use crate::bundler::{Bundle, Bundler, EmittedCode, Minifier, MinifyOptions, MinifyOutput, OutputOptions, SourceMap};
use crate::error::{RollcacheError, RollcacheResult};
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Bundler returning a fixed module list and counting its invocations
pub struct FakeBundler {
    modules: Vec<String>,
    builds: AtomicUsize,
    failure: Mutex<Option<String>>,
}

impl FakeBundler {
    pub fn new(modules: &[&str]) -> Self {
        Self {
            modules: modules.iter().map(|m| m.to_string()).collect(),
            builds: AtomicUsize::new(0),
            failure: Mutex::new(None),
        }
    }

    /// Number of times `build` was called
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Make every following build fail with `reason`
    pub fn fail_with(&self, reason: &str) {
        *self.failure.lock().unwrap() = Some(reason.to_string());
    }
}

#[async_trait]
impl Bundler for FakeBundler {
    async fn build(&self, entry: &Path) -> RollcacheResult<Box<dyn Bundle>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        // Let concurrent requests interleave with the build
        tokio::task::yield_now().await;

        if let Some(reason) = self.failure.lock().unwrap().clone() {
            return Err(RollcacheError::BundleFailed {
                entry: entry.to_path_buf(),
                reason,
            });
        }

        Ok(Box::new(FakeBundle {
            entry: entry.display().to_string(),
            modules: self.modules.clone(),
        }))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

struct FakeBundle {
    entry: String,
    modules: Vec<String>,
}

#[async_trait]
impl Bundle for FakeBundle {
    fn module_ids(&self) -> Vec<String> {
        self.modules.clone()
    }

    async fn emit(&self, options: &OutputOptions) -> RollcacheResult<EmittedCode> {
        Ok(EmittedCode {
            code: format!("/* {} {} */", options.format, self.entry),
            map: options
                .source_map
                .enabled()
                .then(|| SourceMap::new(serde_json::json!({"version": 3, "sources": [self.entry]}))),
        })
    }
}

/// Minifier that upper-cases code and tags the map it was handed
pub struct FakeMinifier {
    pub error: Option<String>,
}

#[async_trait]
impl Minifier for FakeMinifier {
    async fn minify(&self, code: &str, options: &MinifyOptions) -> RollcacheResult<MinifyOutput> {
        Ok(MinifyOutput {
            code: code.to_uppercase(),
            map: options
                .input_map
                .as_ref()
                .map(|map| SourceMap::new(serde_json::json!({"minified": true, "input": map}))),
            warnings: vec!["dropped unused variable".to_string()],
            error: self.error.clone(),
        })
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}
