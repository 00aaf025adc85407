// Entry index - parallel extract and validate into an immutable snapshot

use crate::document::{slug_from_id, split_frontmatter, Entry};
use crate::scanner::{Scan, ScannedFile};
use crate::schema::SchemaRegistry;
use crate::source::ContentSource;
use crate::validation::{normalize, FieldError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Entries of one collection, in path order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionIndex {
    pub(crate) entries: Vec<Entry>,
    pub(crate) by_id: HashMap<String, usize>,
    pub(crate) has_schema: bool,
}

impl CollectionIndex {
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether entries of this collection were validated against a schema.
    pub fn has_schema(&self) -> bool {
        self.has_schema
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryIndex {
    pub(crate) collections: BTreeMap<String, CollectionIndex>,
    pub(crate) config_hash: String,
}

impl EntryIndex {
    pub fn collection(&self, name: &str) -> Option<&CollectionIndex> {
        self.collections.get(name)
    }

    pub fn entry_count(&self) -> usize {
        self.collections.values().map(CollectionIndex::len).sum()
    }

    /// Hash of the configuration the index was validated against.
    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }
}

/// Why a file did not make it into the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryErrorKind {
    Parse { reason: String },
    Validation { errors: Vec<FieldError> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryError {
    pub collection: String,
    pub id: String,
    /// Path relative to the content root.
    pub path: String,
    #[serde(flatten)]
    pub kind: EntryErrorKind,
}

impl EntryError {
    /// Field errors for validation failures, empty for parse errors.
    pub fn field_errors(&self) -> &[FieldError] {
        match &self.kind {
            EntryErrorKind::Validation { errors } => errors,
            EntryErrorKind::Parse { .. } => &[],
        }
    }
}

impl fmt::Display for EntryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EntryErrorKind::Parse { reason } => write!(f, "{}: {}", self.path, reason),
            EntryErrorKind::Validation { errors } => {
                write!(f, "{}: {} validation error(s)", self.path, errors.len())?;
                for error in errors {
                    write!(f, "\n  - {error}")?;
                }
                Ok(())
            }
        }
    }
}

/// Summary of one build: what was indexed and what was rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildReport {
    pub errors: Vec<EntryError>,
    pub entry_count: usize,
    pub collection_count: usize,
    /// Files whose previous outcome was reused from the cache.
    pub cache_hits: usize,
    /// Rebuild generation that produced this report (0 when built outside a store).
    pub generation: u64,
}

impl BuildReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Result of extracting and validating a single file. This is what the
/// entry cache persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileOutcome {
    Entry { data: serde_json::Value, body: String },
    Parse { reason: String },
    Invalid { errors: Vec<FieldError> },
}

/// A previously computed outcome and the fingerprint it was computed for.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedOutcome {
    pub fingerprint: String,
    pub outcome: FileOutcome,
}

pub type PreviousOutcomes = HashMap<ScannedFile, CachedOutcome>;

#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub file: ScannedFile,
    pub fingerprint: Option<String>,
    pub outcome: FileOutcome,
}

#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub index: EntryIndex,
    pub report: BuildReport,
    /// Per-file outcomes in scan order, for persisting to the cache.
    pub outcomes: Vec<FileRecord>,
}

pub struct IndexBuilder<'a> {
    source: &'a dyn ContentSource,
    registry: &'a SchemaRegistry,
    parallel: bool,
    previous: Option<&'a PreviousOutcomes>,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(source: &'a dyn ContentSource, registry: &'a SchemaRegistry) -> Self {
        IndexBuilder {
            source,
            registry,
            parallel: true,
            previous: None,
        }
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Reuse outcomes for files whose fingerprint has not changed. The
    /// caller must only pass outcomes computed under the same configuration.
    pub fn with_previous(mut self, previous: &'a PreviousOutcomes) -> Self {
        self.previous = Some(previous);
        self
    }

    pub fn build(&self, scan: &Scan) -> BuildOutput {
        let files: Vec<&ScannedFile> = scan.files().collect();

        let processed: Vec<(FileRecord, bool)> = if self.parallel {
            files.par_iter().map(|file| self.process(file)).collect()
        } else {
            files.iter().map(|file| self.process(file)).collect()
        };

        let mut index = EntryIndex {
            collections: BTreeMap::new(),
            config_hash: self.registry.config_hash().to_string(),
        };
        for name in scan.collections.keys() {
            index.collections.insert(
                name.clone(),
                CollectionIndex {
                    has_schema: self.registry.get(name).is_some(),
                    ..CollectionIndex::default()
                },
            );
        }

        let mut report = BuildReport {
            collection_count: scan.collections.len(),
            ..BuildReport::default()
        };
        let mut outcomes = Vec::with_capacity(processed.len());

        for (record, cache_hit) in processed {
            if cache_hit {
                report.cache_hits += 1;
            }
            let file = &record.file;
            match &record.outcome {
                FileOutcome::Entry { data, body } => {
                    if let Some(collection) = index.collections.get_mut(&file.collection) {
                        collection.by_id.insert(file.id.clone(), collection.entries.len());
                        collection.entries.push(Entry {
                            id: file.id.clone(),
                            collection: file.collection.clone(),
                            data: data.clone(),
                            body: body.clone(),
                        });
                    }
                }
                FileOutcome::Parse { reason } => report.errors.push(EntryError {
                    collection: file.collection.clone(),
                    id: file.id.clone(),
                    path: file.relative_path(),
                    kind: EntryErrorKind::Parse {
                        reason: reason.clone(),
                    },
                }),
                FileOutcome::Invalid { errors } => report.errors.push(EntryError {
                    collection: file.collection.clone(),
                    id: file.id.clone(),
                    path: file.relative_path(),
                    kind: EntryErrorKind::Validation {
                        errors: errors.clone(),
                    },
                }),
            }
            outcomes.push(record);
        }

        for (name, collection) in &index.collections {
            warn_duplicate_slugs(name, &collection.entries);
        }

        report.entry_count = index.entry_count();
        log::info!(
            "Indexed {} entries in {} collections ({} rejected, {} reused)",
            report.entry_count,
            report.collection_count,
            report.errors.len(),
            report.cache_hits
        );

        BuildOutput {
            index,
            report,
            outcomes,
        }
    }

    fn process(&self, file: &ScannedFile) -> (FileRecord, bool) {
        let fingerprint = self.source.fingerprint(file);

        if let (Some(current), Some(previous)) = (
            fingerprint.as_ref(),
            self.previous.and_then(|p| p.get(file)),
        ) {
            if previous.fingerprint == *current {
                log::debug!("Reusing cached outcome for {}", file.relative_path());
                let record = FileRecord {
                    file: file.clone(),
                    fingerprint,
                    outcome: previous.outcome.clone(),
                };
                return (record, true);
            }
        }

        log::debug!("Processing {}", file.relative_path());
        let outcome = match self.source.read(file) {
            Err(e) => FileOutcome::Parse {
                reason: format!("unreadable file: {e}"),
            },
            Ok(text) => self.evaluate(file, &text),
        };

        let record = FileRecord {
            file: file.clone(),
            fingerprint,
            outcome,
        };
        (record, false)
    }

    fn evaluate(&self, file: &ScannedFile, text: &str) -> FileOutcome {
        let raw = match split_frontmatter(text) {
            Ok(raw) => raw,
            Err(reason) => return FileOutcome::Parse { reason },
        };

        match normalize(&raw.data, self.registry.get(&file.collection)) {
            Ok(data) => FileOutcome::Entry {
                data,
                body: raw.body,
            },
            Err(errors) => FileOutcome::Invalid { errors },
        }
    }
}

fn warn_duplicate_slugs(collection: &str, entries: &[Entry]) {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for entry in entries {
        if let Some(first) = seen.insert(slug_from_id(&entry.id), &entry.id) {
            log::warn!(
                "Collection '{}': entries '{}' and '{}' share slug '{}'",
                collection,
                first,
                entry.id,
                entry.slug()
            );
        }
    }
}
