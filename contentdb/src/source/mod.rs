use crate::error::{ContentError, Result};
use crate::scanner::{self, Scan, ScanOptions, ScannedFile};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Where content comes from. The index builder only reads through this
/// trait, so tests can drive the whole pipeline from a [`MemorySource`].
pub trait ContentSource: Send + Sync {
    /// Discover collections and their files.
    fn scan(&self, options: &ScanOptions) -> Result<Scan>;

    /// Read one file's full text.
    fn read(&self, file: &ScannedFile) -> Result<String>;

    /// Read the content configuration file, `None` when it does not exist.
    fn read_config(&self, file_name: &str) -> Result<Option<String>>;

    /// Digest of a file's content. Two equal fingerprints mean the previous
    /// extraction and validation result can be reused, so it must change
    /// whenever the bytes do.
    fn fingerprint(&self, _file: &ScannedFile) -> Option<String> {
        None
    }

    /// Human-readable location, used in logs and status output.
    fn describe(&self) -> String;
}

/// Content root on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsSource { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, file: &ScannedFile) -> PathBuf {
        let mut path = self.root.join(&file.collection);
        for segment in file.id.split('/') {
            path.push(segment);
        }
        path
    }
}

impl ContentSource for FsSource {
    fn scan(&self, options: &ScanOptions) -> Result<Scan> {
        scanner::scan_directory(&self.root, options)
    }

    fn read(&self, file: &ScannedFile) -> Result<String> {
        let bytes = std::fs::read(self.path_of(file))?;
        String::from_utf8(bytes)
            .map_err(|e| ContentError::Other(format!("file is not valid UTF-8: {e}")))
    }

    fn read_config(&self, file_name: &str) -> Result<Option<String>> {
        let path = self.root.join(file_name);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(path)?))
    }

    fn fingerprint(&self, file: &ScannedFile) -> Option<String> {
        let bytes = std::fs::read(self.path_of(file)).ok()?;
        Some(format!("{:x}", Sha256::digest(&bytes)))
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// In-memory content tree keyed by root-relative `/`-separated path.
/// Mutations go through `&self` so a source shared with a store can be
/// edited between rebuilds.
#[derive(Debug, Default)]
pub struct MemorySource {
    files: RwLock<BTreeMap<String, String>>,
    dirs: RwLock<BTreeSet<String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.insert(path, content);
        self
    }

    /// Declare a (possibly empty) collection directory.
    pub fn with_dir(self, name: &str) -> Self {
        self.dirs.write().insert(name.to_string());
        self
    }

    pub fn insert(&self, path: &str, content: &str) {
        if let Some((dir, _)) = path.split_once('/') {
            self.dirs.write().insert(dir.to_string());
        }
        self.files
            .write()
            .insert(path.to_string(), content.to_string());
    }

    pub fn remove(&self, path: &str) -> Option<String> {
        self.files.write().remove(path)
    }
}

impl ContentSource for MemorySource {
    fn scan(&self, options: &ScanOptions) -> Result<Scan> {
        let dirs = self.dirs.read();
        let files = self.files.read();
        scanner::group_paths(dirs.iter(), files.keys(), options)
    }

    fn read(&self, file: &ScannedFile) -> Result<String> {
        self.files
            .read()
            .get(&file.relative_path())
            .cloned()
            .ok_or_else(|| {
                ContentError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} is not in the memory source", file.relative_path()),
                ))
            })
    }

    fn read_config(&self, file_name: &str) -> Result<Option<String>> {
        Ok(self.files.read().get(file_name).cloned())
    }

    fn fingerprint(&self, file: &ScannedFile) -> Option<String> {
        let files = self.files.read();
        let content = files.get(&file.relative_path())?;
        Some(format!("{:x}", Sha256::digest(content.as_bytes())))
    }

    fn describe(&self) -> String {
        "<memory>".to_string()
    }
}
