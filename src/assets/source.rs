use crate::foundation::error::{RenderError, RenderResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Loader seam for image files: existence checks and raw bytes by `(dir, name)`.
///
/// The core never interprets archive formats; a packaged game supplies its own implementation.
pub trait AssetSource {
    /// Return `true` when `dir/name` can be read.
    fn exists(&self, dir: &str, name: &str) -> bool;

    /// Read the whole file.
    fn read(&self, dir: &str, name: &str) -> RenderResult<Vec<u8>>;
}

/// Plain directory tree rooted at `root`.
#[derive(Debug, Clone)]
pub struct FsAssetSource {
    root: PathBuf,
}

impl FsAssetSource {
    /// Serve files below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetSource for FsAssetSource {
    fn exists(&self, dir: &str, name: &str) -> bool {
        make_valid_path(&self.root, dir, name).is_file()
    }

    fn read(&self, dir: &str, name: &str) -> RenderResult<Vec<u8>> {
        let path = make_valid_path(&self.root, dir, name);
        std::fs::read(&path)
            .map_err(|e| RenderError::decode(format!("cannot read '{}': {e}", path.display())))
    }
}

/// Archive contents already held in memory, keyed by `dir/name`.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssetSource {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryAssetSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file.
    pub fn insert(&mut self, dir: &str, name: &str, bytes: Vec<u8>) {
        self.files.insert(join_key(dir, name), bytes);
    }
}

impl AssetSource for MemoryAssetSource {
    fn exists(&self, dir: &str, name: &str) -> bool {
        self.files.contains_key(&join_key(dir, name))
    }

    fn read(&self, dir: &str, name: &str) -> RenderResult<Vec<u8>> {
        let key = join_key(dir, name);
        self.files
            .get(&key)
            .cloned()
            .ok_or_else(|| RenderError::decode(format!("no such file '{key}'")))
    }
}

/// Join a data directory and file name below `root`. An empty `dir` means the root itself.
pub fn make_valid_path(root: &Path, dir: &str, name: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    if !dir.is_empty() {
        path.push(dir);
    }
    path.push(name);
    path
}

fn join_key(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_owned()
    } else {
        format!("{dir}/{name}")
    }
}
