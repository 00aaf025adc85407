// Collection scanner - top-level directories are collections, content files below them are entries

use crate::error::{ContentError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

pub const DEFAULT_EXTENSIONS: &[&str] = &["md", "mdx", "markdown"];
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// What counts as content during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    pub extensions: Vec<String>,
    pub config_file: String,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            config_file: DEFAULT_CONFIG_FILE.to_string(),
        }
    }
}

impl ScanOptions {
    pub fn is_content_file(&self, path: &str) -> bool {
        let name = path.rsplit('/').next().unwrap_or(path);
        match name.rfind('.') {
            Some(0) | None => false,
            Some(dot) => {
                let ext = &name[dot + 1..];
                self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
            }
        }
    }
}

/// One discovered content file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScannedFile {
    pub collection: String,
    /// Path relative to the collection directory, `/`-separated.
    pub id: String,
}

impl ScannedFile {
    /// Path relative to the content root.
    pub fn relative_path(&self) -> String {
        format!("{}/{}", self.collection, self.id)
    }
}

/// Result of a scan: collection name to its files in deterministic order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scan {
    pub collections: BTreeMap<String, Vec<ScannedFile>>,
}

impl Scan {
    /// All files, collections in name order, entries in path order.
    pub fn files(&self) -> impl Iterator<Item = &ScannedFile> {
        self.collections.values().flatten()
    }

    pub fn file_count(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    pub fn contains(&self, collection: &str) -> bool {
        self.collections.contains_key(collection)
    }
}

fn is_hidden(segment: &str) -> bool {
    segment.starts_with('.') || segment.starts_with('_')
}

/// Group root-relative paths into collections.
///
/// `dirs` are the directory names directly under the root; `files` are
/// `/`-separated paths relative to the root. Content files with no
/// enclosing collection directory are rejected.
pub fn group_paths<D, F>(dirs: D, files: F, options: &ScanOptions) -> Result<Scan>
where
    D: IntoIterator,
    D::Item: AsRef<str>,
    F: IntoIterator,
    F::Item: AsRef<str>,
{
    let mut collections: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for dir in dirs {
        let dir = dir.as_ref();
        if !is_hidden(dir) {
            collections.entry(dir.to_string()).or_default();
        }
    }

    for path in files {
        let path = path.as_ref();
        match path.split_once('/') {
            None => {
                if path == options.config_file || is_hidden(path) {
                    continue;
                }
                if options.is_content_file(path) {
                    return Err(ContentError::AmbiguousPlacement {
                        path: path.to_string(),
                    });
                }
            }
            Some((collection, id)) => {
                if path.split('/').any(is_hidden) || !options.is_content_file(id) {
                    continue;
                }
                collections
                    .entry(collection.to_string())
                    .or_default()
                    .insert(id.to_string());
            }
        }
    }

    let collections = collections
        .into_iter()
        .map(|(name, ids)| {
            let files = ids
                .into_iter()
                .map(|id| ScannedFile {
                    collection: name.clone(),
                    id,
                })
                .collect();
            (name, files)
        })
        .collect();

    Ok(Scan { collections })
}

/// Walk a content root on disk.
pub fn scan_directory(root: &Path, options: &ScanOptions) -> Result<Scan> {
    if !root.is_dir() {
        return Err(ContentError::Scan {
            path: root.to_path_buf(),
            reason: "content root does not exist or is not a directory".to_string(),
        });
    }

    let read_dir = std::fs::read_dir(root).map_err(|e| scan_error(root, &e))?;

    let mut dirs = Vec::new();
    let mut files = Vec::new();

    for entry in read_dir {
        let entry = entry.map_err(|e| scan_error(root, &e))?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            log::warn!("Skipping non UTF-8 path {}", entry.path().display());
            continue;
        };
        let file_type = entry.file_type().map_err(|e| scan_error(&entry.path(), &e))?;

        if file_type.is_dir() || (file_type.is_symlink() && entry.path().is_dir()) {
            if is_hidden(&name) {
                continue;
            }
            collect_collection_files(root, &entry.path(), &mut files)?;
            dirs.push(name);
        } else {
            files.push(name);
        }
    }

    let scan = group_paths(&dirs, &files, options)?;
    log::debug!(
        "Scanned {}: {} collections, {} files",
        root.display(),
        scan.collections.len(),
        scan.file_count()
    );
    Ok(scan)
}

/// Recursively collect every file below a collection directory as
/// root-relative `/`-separated paths.
fn collect_collection_files(root: &Path, dir: &Path, files: &mut Vec<String>) -> Result<()> {
    let pattern = format!(
        "{}/**/*",
        glob::Pattern::escape(&dir.to_string_lossy())
    );
    let paths = glob::glob(&pattern).map_err(|e| ContentError::Scan {
        path: dir.to_path_buf(),
        reason: format!("invalid scan pattern: {e}"),
    })?;

    for path in paths {
        let path = path.map_err(|e| ContentError::Scan {
            path: e.path().to_path_buf(),
            reason: e.error().to_string(),
        })?;
        if path.is_dir() {
            continue;
        }
        match relative_slash_path(root, &path) {
            Some(rel) => files.push(rel),
            None => log::warn!("Skipping non UTF-8 path {}", path.display()),
        }
    }
    Ok(())
}

fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let segments: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
    Some(segments?.join("/"))
}

fn scan_error(path: &Path, error: &std::io::Error) -> ContentError {
    ContentError::Scan {
        path: PathBuf::from(path),
        reason: error.to_string(),
    }
}
