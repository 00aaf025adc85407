use crate::scanner::{ScanOptions, DEFAULT_CONFIG_FILE, DEFAULT_EXTENSIONS};
use std::path::{Path, PathBuf};

/// Settings for opening a [`ContentStore`](crate::ContentStore).
#[derive(Debug, Clone, PartialEq)]
pub struct StoreOptions {
    /// Content root; every directory directly below it is a collection.
    pub root: PathBuf,
    /// Name of the configuration file, relative to the root.
    pub config_file: String,
    /// Recognized content extensions, without the leading dot.
    pub extensions: Vec<String>,
    /// Run per-file extraction and validation on the rayon pool.
    pub parallel: bool,
    /// Location of the SQLite entry cache. `None` disables caching.
    pub cache_path: Option<PathBuf>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            root: PathBuf::from("content"),
            config_file: DEFAULT_CONFIG_FILE.to_string(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            parallel: true,
            cache_path: None,
        }
    }
}

impl StoreOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        StoreOptions {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn config_file(mut self, name: impl Into<String>) -> Self {
        self.config_file = name.into();
        self
    }

    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Use the conventional cache location, `{root}/.contentdb/cache.db`.
    /// The leading dot keeps it out of collection discovery.
    pub fn default_cache(self) -> Self {
        let path = default_cache_path(&self.root);
        self.cache_path(path)
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            extensions: self.extensions.clone(),
            config_file: self.config_file.clone(),
        }
    }
}

pub fn default_cache_path(root: &Path) -> PathBuf {
    root.join(".contentdb").join("cache.db")
}
