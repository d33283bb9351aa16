//! Writing bundles and source maps to disk

use crate::bundler::{EmittedCode, SourceMapMode};
use crate::error::{RollcacheError, RollcacheResult};
use crate::fs::FileSystem;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Path of the sibling source map for `dest`
pub fn map_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".map");
    PathBuf::from(name)
}

/// Write `emitted` to `dest`, returning the code as written
///
/// The parent directory is created when missing. When a map is present and
/// `source_map` asks for one, a `sourceMappingURL` comment is appended and,
/// in file mode, the map is written next to the bundle.
pub async fn write_bundle(
    fs: &dyn FileSystem,
    emitted: &EmittedCode,
    dest: &Path,
    source_map: SourceMapMode,
) -> RollcacheResult<String> {
    ensure_parent_dir(fs, dest).await?;

    let mut code = emitted.code.clone();
    let map = emitted.map.as_ref().filter(|_| source_map.enabled());
    if let Some(map) = map {
        debug!(target: "rollcache::build", "{} source map for {}", source_map, dest.display());
        code.push_str("\n//# sourceMappingURL=");
        match source_map {
            SourceMapMode::Inline => code.push_str(&map.to_url()),
            _ => code.push_str(&file_name(&map_path(dest))),
        }
    }

    let write_code = async {
        fs.write(dest, code.as_bytes())
            .await
            .map_err(|e| RollcacheError::write(dest, e.to_string()))
    };
    let write_map = async {
        match map {
            Some(map) if source_map == SourceMapMode::File => {
                let path = map_path(dest);
                fs.write(&path, map.to_json().as_bytes())
                    .await
                    .map_err(|e| RollcacheError::write(path, e.to_string()))
            }
            _ => Ok(()),
        }
    };
    tokio::try_join!(write_code, write_map)?;

    Ok(code)
}

async fn ensure_parent_dir(fs: &dyn FileSystem, dest: &Path) -> RollcacheResult<()> {
    let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };

    let state = fs
        .stat(parent)
        .await
        .map_err(|e| RollcacheError::write(dest, e.to_string()))?;

    match state {
        Some(state) if state.is_dir => Ok(()),
        Some(_) => Err(RollcacheError::write(
            dest,
            format!("{} is not a directory", parent.display()),
        )),
        None => {
            debug!(target: "rollcache::build", "Creating directory {}", parent.display());
            fs.create_dir_all(parent)
                .await
                .map_err(|e| RollcacheError::write(dest, e.to_string()))
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
