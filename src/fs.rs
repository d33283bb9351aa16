//! Filesystem access used by the coordinator
//!
//! Every freshness check, directory probe and artifact write goes through
//! the [`FileSystem`] trait so the coordinator can run against the real disk
//! ([`TokioFs`]) or, in tests, against an in-memory filesystem whose
//! modification times come from a logical clock.

use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Snapshot of a path that exists on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileState {
    /// Last modification time
    pub modified: SystemTime,
    /// Whether the path is a directory
    pub is_dir: bool,
}

/// Abstract filesystem interface
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Stat a path, returning `Ok(None)` when it does not exist
    async fn stat(&self, path: &Path) -> io::Result<Option<FileState>>;

    /// Read a file's contents
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Write a file, replacing existing contents
    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Create a directory and all missing parents
    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Check whether a path exists
    async fn exists(&self, path: &Path) -> io::Result<bool> {
        Ok(self.stat(path).await?.is_some())
    }
}

/// The real filesystem, accessed through `tokio::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFs;

#[async_trait]
impl FileSystem for TokioFs {
    async fn stat(&self, path: &Path) -> io::Result<Option<FileState>> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(Some(FileState {
                modified: meta.modified()?,
                is_dir: meta.is_dir(),
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        tokio::fs::write(path, contents).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }
}

#[cfg(test)]
pub use memory::MemoryFs;

#[cfg(test)]
mod memory {
    use super::{FileState, FileSystem};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Mutex, MutexGuard, PoisonError};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    #[derive(Debug, Clone)]
    enum Node {
        File { contents: Vec<u8>, modified: u64 },
        Dir { modified: u64 },
    }

    /// In-memory filesystem with a logical clock
    ///
    /// Each mutation advances the clock by one second, so a file written later
    /// is always strictly newer than one written earlier. Directories are
    /// implied by the files beneath them.
    #[derive(Debug, Default)]
    pub struct MemoryFs {
        nodes: Mutex<HashMap<PathBuf, Node>>,
        clock: AtomicU64,
    }

    impl MemoryFs {
        /// Create an empty filesystem
        pub fn new() -> Self {
            Self::default()
        }

        /// Add or replace a file, stamping it with the next clock tick
        pub fn add_file(&self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) {
            let modified = self.tick();
            self.nodes().insert(
                path.as_ref().to_path_buf(),
                Node::File {
                    contents: contents.into(),
                    modified,
                },
            );
        }

        /// Bump a file's modification time to the next clock tick
        pub fn touch(&self, path: impl AsRef<Path>) {
            let modified = self.tick();
            if let Some(Node::File { modified: m, .. }) = self.nodes().get_mut(path.as_ref()) {
                *m = modified;
            }
        }

        /// Set a file's modification time to an explicit number of seconds
        pub fn set_modified(&self, path: impl AsRef<Path>, secs: u64) {
            if let Some(Node::File { modified, .. }) = self.nodes().get_mut(path.as_ref()) {
                *modified = secs;
            }
        }

        /// Remove a file
        pub fn remove(&self, path: impl AsRef<Path>) {
            self.nodes().remove(path.as_ref());
        }

        /// Current contents of a file, if present
        pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
            match self.nodes().get(path.as_ref()) {
                Some(Node::File { contents, .. }) => Some(contents.clone()),
                _ => None,
            }
        }

        fn tick(&self) -> u64 {
            self.clock.fetch_add(1, Ordering::SeqCst) + 1
        }

        fn nodes(&self) -> MutexGuard<'_, HashMap<PathBuf, Node>> {
            self.nodes.lock().unwrap_or_else(PoisonError::into_inner)
        }

        fn lookup(nodes: &HashMap<PathBuf, Node>, path: &Path) -> Option<FileState> {
            if let Some(node) = nodes.get(path) {
                return Some(match node {
                    Node::File { modified, .. } => FileState {
                        modified: timestamp(*modified),
                        is_dir: false,
                    },
                    Node::Dir { modified } => FileState {
                        modified: timestamp(*modified),
                        is_dir: true,
                    },
                });
            }

            // A directory is implied by anything stored beneath it
            nodes
                .keys()
                .any(|p| p != path && p.starts_with(path))
                .then(|| FileState {
                    modified: UNIX_EPOCH,
                    is_dir: true,
                })
        }
    }

    fn timestamp(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn not_a_directory(path: &Path) -> io::Error {
        io::Error::new(
            io::ErrorKind::Other,
            format!("{} is not a directory", path.display()),
        )
    }

    #[async_trait]
    impl FileSystem for MemoryFs {
        async fn stat(&self, path: &Path) -> io::Result<Option<FileState>> {
            Ok(Self::lookup(&self.nodes(), path))
        }

        async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
            self.contents(path).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} not found", path.display()),
                )
            })
        }

        async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
            let modified = self.tick();
            let mut nodes = self.nodes();
            for ancestor in path.ancestors().skip(1) {
                if let Some(Node::File { .. }) = nodes.get(ancestor) {
                    return Err(not_a_directory(ancestor));
                }
            }
            if let Some(Node::Dir { .. }) = nodes.get(path) {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("{} is a directory", path.display()),
                ));
            }
            nodes.insert(
                path.to_path_buf(),
                Node::File {
                    contents: contents.to_vec(),
                    modified,
                },
            );
            Ok(())
        }

        async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
            let modified = self.tick();
            let mut nodes = self.nodes();
            for ancestor in path.ancestors() {
                match nodes.get(ancestor) {
                    Some(Node::File { .. }) => return Err(not_a_directory(ancestor)),
                    Some(Node::Dir { .. }) => {}
                    None => {
                        nodes.insert(ancestor.to_path_buf(), Node::Dir { modified });
                    }
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn memory_clock_orders_writes() {
        let fs = MemoryFs::new();
        fs.add_file("/src/a.js", "a");
        fs.add_file("/src/b.js", "b");

        let a = fs.stat(Path::new("/src/a.js")).await.unwrap().unwrap();
        let b = fs.stat(Path::new("/src/b.js")).await.unwrap().unwrap();
        assert!(b.modified > a.modified);

        fs.touch("/src/a.js");
        let a = fs.stat(Path::new("/src/a.js")).await.unwrap().unwrap();
        assert!(a.modified > b.modified);
    }

    #[tokio::test]
    async fn memory_implied_directories() {
        let fs = MemoryFs::new();
        fs.add_file("/out/js/app.js", "x");

        let dir = fs.stat(Path::new("/out/js")).await.unwrap().unwrap();
        assert!(dir.is_dir);
        assert!(fs.stat(Path::new("/elsewhere")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_write_under_file_fails() {
        let fs = MemoryFs::new();
        fs.add_file("/out", "not a dir");

        assert!(fs.write(Path::new("/out/app.js"), b"x").await.is_err());
        assert!(fs.create_dir_all(Path::new("/out/js")).await.is_err());
    }

    #[tokio::test]
    async fn tokio_stat_missing_is_none() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.js");

        assert!(TokioFs.stat(&missing).await.unwrap().is_none());
        assert!(!TokioFs.exists(&missing).await.unwrap());
    }

    #[tokio::test]
    async fn tokio_write_and_read() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.js");

        TokioFs.write(&path, b"console.log(1)").await.unwrap();
        let state = TokioFs.stat(&path).await.unwrap().unwrap();

        assert!(!state.is_dir);
        assert_eq!(TokioFs.read(&path).await.unwrap(), b"console.log(1)");
    }
}
