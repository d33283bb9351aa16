//! Mapping request URLs to entry and output paths

use crate::build::BuildTarget;
use crate::bundler::OutputOptions;
use crate::middleware::MiddlewareOptions;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

const HANDLED_METHODS: [&str; 2] = ["GET", "HEAD"];

/// An incoming request, reduced to what routing needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// Request target as sent, query string included
    pub path: String,
}

impl Request {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path)
    }
}

/// Resolve the build target for `request`, or `None` when the request is
/// not a bundle request
pub fn resolve(options: &MiddlewareOptions, output: &OutputOptions, request: &Request) -> Option<BuildTarget> {
    if !HANDLED_METHODS.contains(&request.method.to_ascii_uppercase().as_str()) {
        debug!(target: "rollcache::serve", "Ignoring {} request", request.method);
        return None;
    }

    let pathname = request.path.split(['?', '#']).next().unwrap_or_default();
    if !pathname.ends_with(".js") {
        return None;
    }

    let pathname = match options.prefix.as_deref() {
        Some(prefix) if !prefix.is_empty() => pathname.strip_prefix(prefix).unwrap_or(pathname),
        _ => pathname,
    };

    let relative = relative_path(pathname)?;
    let relative = strip_dir(&relative, &options.dest);

    let name = relative.to_string_lossy();
    let stem = name.strip_suffix(".js")?;
    let entry_name = format!("{}{}", stem, options.bundle_extension);

    Some(BuildTarget {
        entry: options.root.join(&options.src).join(entry_name),
        dest: options.root.join(&options.dest).join(&relative),
        output: output.clone(),
    })
}

/// Turn a URL path into a relative filesystem path, refusing to leave root
fn relative_path(pathname: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in Path::new(pathname).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => {
                debug!(target: "rollcache::serve", "Refusing path {}", pathname);
                return None;
            }
        }
    }
    (!relative.as_os_str().is_empty()).then_some(relative)
}

/// Drop a leading `dir` from `path` when `path` lives under it
fn strip_dir(path: &Path, dir: &Path) -> PathBuf {
    let dir: PathBuf = dir
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    if dir.as_os_str().is_empty() {
        return path.to_path_buf();
    }
    match path.strip_prefix(&dir) {
        Ok(rest) if !rest.as_os_str().is_empty() => rest.to_path_buf(),
        _ => path.to_path_buf(),
    }
}
