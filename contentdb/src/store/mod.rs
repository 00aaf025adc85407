use crate::cache::EntryCache;
use crate::document::Entry;
use crate::error::Result;
use crate::index::{BuildOutput, BuildReport, EntryIndex, IndexBuilder, PreviousOutcomes};
use crate::options::StoreOptions;
use crate::schema::SchemaRegistry;
use crate::source::{ContentSource, FsSource};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The main entry point for contentdb.
/// Owns the content source, runs the scan-validate-index pipeline and keeps
/// the latest published index snapshot for queries.
pub struct ContentStore {
    source: Arc<dyn ContentSource>,
    options: StoreOptions,
    published: RwLock<Published>,
    issued: AtomicU64,
    cache: Option<Mutex<EntryCache>>,
}

/// Index and report are swapped together so readers never pair a new index
/// with an old report.
struct Published {
    index: Arc<EntryIndex>,
    report: Arc<BuildReport>,
    generation: u64,
}

/// Handle for one rebuild. Only the most recently issued ticket can publish.
#[derive(Debug)]
pub struct RebuildTicket {
    generation: u64,
}

impl RebuildTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl ContentStore {
    /// Open a content root on disk and run the first build.
    pub fn open(options: StoreOptions) -> Result<Self> {
        let source = Arc::new(FsSource::new(options.root.clone()));
        Self::with_source(source, options)
    }

    /// Build over any content source. `options.root` is only used for
    /// display when the source is not the filesystem.
    pub fn with_source(source: Arc<dyn ContentSource>, options: StoreOptions) -> Result<Self> {
        let cache = match &options.cache_path {
            Some(path) => Some(Mutex::new(EntryCache::open(path)?)),
            None => None,
        };

        let store = ContentStore {
            source,
            options,
            published: RwLock::new(Published {
                index: Arc::new(EntryIndex::default()),
                report: Arc::new(BuildReport::default()),
                generation: 0,
            }),
            issued: AtomicU64::new(0),
            cache,
        };

        store.rebuild()?;
        Ok(store)
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn source(&self) -> &Arc<dyn ContentSource> {
        &self.source
    }

    // ── Rebuild Lifecycle ────────────────────────────────────────────

    /// Start a rebuild. Issuing a ticket makes every older ticket stale.
    pub fn begin_rebuild(&self) -> RebuildTicket {
        let generation = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        RebuildTicket { generation }
    }

    /// Run the full pipeline for a ticket without publishing the result.
    ///
    /// Loads the configuration, scans the source, reuses cached outcomes when
    /// the configuration is unchanged and builds a fresh index. Scan and
    /// configuration errors are fatal; per-file problems end up in the report.
    pub fn build(&self, ticket: &RebuildTicket) -> Result<BuildOutput> {
        let config_text = self.source.read_config(&self.options.config_file)?;
        let registry = match &config_text {
            Some(text) => SchemaRegistry::load(text)?,
            None => {
                log::debug!(
                    "No {} in {}, all collections are schemaless",
                    self.options.config_file,
                    self.source.describe()
                );
                SchemaRegistry::empty()
            }
        };

        let scan = self.source.scan(&self.options.scan_options())?;
        for name in registry.declared_collections() {
            if !scan.contains(name) {
                log::warn!(
                    "Collection '{}' is declared in {} but has no directory",
                    name,
                    self.options.config_file
                );
            }
        }

        let previous = self.load_previous(&registry);
        let mut output = IndexBuilder::new(self.source.as_ref(), &registry)
            .parallel(self.options.parallel)
            .with_previous(&previous)
            .build(&scan);
        output.report.generation = ticket.generation;

        self.store_outcomes(&registry, config_text.as_deref().unwrap_or(""), &output);
        Ok(output)
    }

    /// Publish a finished build. Returns `false` and discards the output when
    /// a newer rebuild was started after this ticket was issued.
    pub fn publish(&self, ticket: RebuildTicket, output: BuildOutput) -> bool {
        let mut published = self.published.write();
        let latest = self.issued.load(Ordering::SeqCst);
        if ticket.generation != latest || ticket.generation <= published.generation {
            log::warn!(
                "Discarding stale rebuild {} (latest is {})",
                ticket.generation,
                latest
            );
            return false;
        }

        *published = Published {
            index: Arc::new(output.index),
            report: Arc::new(output.report),
            generation: ticket.generation,
        };
        true
    }

    /// Rebuild the index wholesale and publish it. Returns the report of the
    /// published build, or `None` when a newer rebuild superseded this one.
    pub fn rebuild(&self) -> Result<Option<Arc<BuildReport>>> {
        let ticket = self.begin_rebuild();
        let output = self.build(&ticket)?;
        let report = Arc::new(output.report.clone());
        Ok(self.publish(ticket, output).then_some(report))
    }

    fn load_previous(&self, registry: &SchemaRegistry) -> PreviousOutcomes {
        let Some(cache) = &self.cache else {
            return PreviousOutcomes::new();
        };
        let cache = cache.lock();
        let key = cache_key(registry);

        let loaded = cache.get_last_config_hash().and_then(|last| match last {
            Some(last) if last == key => cache.load_entries(),
            Some(_) => {
                log::info!("Configuration or engine version changed, dropping cached entries");
                cache.clear_entries()?;
                Ok(PreviousOutcomes::new())
            }
            None => Ok(PreviousOutcomes::new()),
        });

        match loaded {
            Ok(previous) => previous,
            Err(e) => {
                log::warn!("Failed to read entry cache: {e}");
                PreviousOutcomes::new()
            }
        }
    }

    fn store_outcomes(&self, registry: &SchemaRegistry, config_text: &str, output: &BuildOutput) {
        let Some(cache) = &self.cache else {
            return;
        };
        let mut cache = cache.lock();
        let key = cache_key(registry);

        let result = cache.get_last_config_hash().and_then(|last| {
            if last.as_deref() != Some(key.as_str()) {
                cache.record_config(&key, config_text)?;
            }
            cache.replace_entries(&output.outcomes)?;
            cache.entry_count()
        });
        match result {
            Ok(count) => log::debug!("Entry cache holds {count} outcomes"),
            Err(e) => log::warn!("Failed to update entry cache: {e}"),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// The current index snapshot. It stays valid and unchanged while newer
    /// snapshots are published.
    pub fn snapshot(&self) -> Arc<EntryIndex> {
        self.published.read().index.clone()
    }

    /// Report of the build behind the current snapshot.
    pub fn report(&self) -> Arc<BuildReport> {
        self.published.read().report.clone()
    }

    /// Generation of the current snapshot.
    pub fn generation(&self) -> u64 {
        self.published.read().generation
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.snapshot()
            .collection_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn get_collection(&self, collection: &str) -> Result<Vec<Entry>> {
        Ok(self.snapshot().get_collection(collection)?.to_vec())
    }

    pub fn get_collection_where<P>(&self, collection: &str, predicate: P) -> Result<Vec<Entry>>
    where
        P: Fn(&Entry) -> bool,
    {
        let snapshot = self.snapshot();
        let entries = snapshot.get_collection_where(collection, predicate)?;
        Ok(entries.into_iter().cloned().collect())
    }

    pub fn get_entry(&self, collection: &str, id: &str) -> Result<Entry> {
        Ok(self.snapshot().get_entry(collection, id)?.clone())
    }

    pub fn get_entry_by_slug(&self, collection: &str, slug: &str) -> Result<Entry> {
        Ok(self.snapshot().get_entry_by_slug(collection, slug)?.clone())
    }

    pub fn get_collection_as<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<Entry<T>>> {
        self.snapshot().get_collection_as(collection)
    }

    pub fn get_entry_as<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Entry<T>> {
        self.snapshot().get_entry_as(collection, id)
    }

    /// Status information: source, generation, config hash, per-collection
    /// counts and rejected entries.
    pub fn status(&self) -> serde_json::Value {
        let (index, report, generation) = {
            let published = self.published.read();
            (
                published.index.clone(),
                published.report.clone(),
                published.generation,
            )
        };

        let mut collections = serde_json::Map::new();
        for name in index.collection_names() {
            let Some(collection) = index.collection(name) else {
                continue;
            };
            let rejected = report.errors.iter().filter(|e| e.collection == name).count();
            collections.insert(
                name.to_string(),
                serde_json::json!({
                    "entries": collection.len(),
                    "rejected": rejected,
                    "schema": collection.has_schema(),
                }),
            );
        }

        serde_json::json!({
            "source": self.source.describe(),
            "generation": generation,
            "config_hash": index.config_hash(),
            "collections": collections,
            "entries": report.entry_count,
            "errors": report.errors.len(),
            "cache_hits": report.cache_hits,
            "cache": self.options.cache_path.as_ref().map(|p| p.display().to_string()),
        })
    }
}

/// Cached outcomes are valid for one configuration under one engine version.
fn cache_key(registry: &SchemaRegistry) -> String {
    format!("{}:{}", env!("CARGO_PKG_VERSION"), registry.config_hash())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContentError;
    use crate::source::MemorySource;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
blog:
  schema:
    title: string
    status: { type: string, enum: [draft, published], default: published }
    language: { type: string, default: en }
    authorContact: { type: string, format: email, optional: true }
docs: {}
"#;

    fn setup_test_store() -> (TempDir, ContentStore) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("blog")).unwrap();
        std::fs::create_dir_all(root.join("docs/en")).unwrap();
        std::fs::write(root.join("config.yaml"), CONFIG).unwrap();
        std::fs::write(
            root.join("blog/first-post.md"),
            "---\ntitle: First\nstatus: draft\n---\nHello",
        )
        .unwrap();
        std::fs::write(root.join("blog/second-post.md"), "---\ntitle: Second\n---\nWorld").unwrap();
        std::fs::write(
            root.join("blog/third-post.md"),
            "---\ntitle: Third\nstatus: draft\nauthorContact: jeff\n---\n",
        )
        .unwrap();
        std::fs::write(
            root.join("docs/en/getting-started.md"),
            "---\ntitle: Getting Started\n---\n# Start",
        )
        .unwrap();

        let store = ContentStore::open(StoreOptions::new(root)).unwrap();
        (tmp, store)
    }

    fn memory_store(source: Arc<MemorySource>) -> ContentStore {
        memory_store_with(source)
    }

    fn memory_store_with(source: Arc<dyn ContentSource>) -> ContentStore {
        ContentStore::with_source(source, StoreOptions::default().parallel(false)).unwrap()
    }

    fn ids(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_open_and_query() {
        let (_tmp, store) = setup_test_store();

        let blog = store.get_collection("blog").unwrap();
        assert_eq!(ids(&blog), vec!["first-post.md", "second-post.md"]);
        assert_eq!(blog[1].data["language"], "en");
        assert_eq!(blog[1].data["status"], "published");

        let entry = store.get_entry("docs", "en/getting-started.md").unwrap();
        assert_eq!(entry.slug(), "en/getting-started");
        assert_eq!(entry.body, "# Start");
    }

    #[test]
    fn test_invalid_entry_excluded_and_reported() {
        let (_tmp, store) = setup_test_store();

        let report = store.report();
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].id, "third-post.md");
        assert_eq!(report.errors[0].field_errors()[0].field, "authorContact");

        let err = store.get_entry("blog", "third-post.md").unwrap_err();
        assert!(matches!(err, ContentError::EntryNotFound { .. }));
    }

    #[test]
    fn test_filtering() {
        let (_tmp, store) = setup_test_store();
        let drafts = store
            .get_collection_where("blog", |e| e.data["status"] == "draft")
            .unwrap();
        assert_eq!(ids(&drafts), vec!["first-post.md"]);
    }

    #[test]
    fn test_not_found() {
        let (_tmp, store) = setup_test_store();
        assert!(matches!(
            store.get_collection("nonexistent").unwrap_err(),
            ContentError::CollectionNotFound { .. }
        ));
        assert!(store.get_entry("nonexistent", "x.md").unwrap_err().is_not_found());
    }

    #[test]
    fn test_typed_query() {
        #[derive(Debug, Deserialize)]
        struct Post {
            title: String,
            language: String,
        }

        let (_tmp, store) = setup_test_store();
        let posts: Vec<Entry<Post>> = store.get_collection_as("blog").unwrap();
        assert_eq!(posts[0].data.title, "First");
        assert_eq!(posts[0].data.language, "en");
    }

    #[test]
    fn test_rebuild_picks_up_changes() {
        let (tmp, store) = setup_test_store();
        let before = store.snapshot();

        std::fs::write(tmp.path().join("blog/another.md"), "---\ntitle: Another\n---\n").unwrap();
        std::fs::remove_file(tmp.path().join("blog/second-post.md")).unwrap();
        store.rebuild().unwrap().unwrap();

        assert_eq!(
            ids(&store.get_collection("blog").unwrap()),
            vec!["another.md", "first-post.md"]
        );
        // Old snapshot is untouched.
        assert_eq!(ids(before.get_collection("blog").unwrap()), vec!["first-post.md", "second-post.md"]);
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let (_tmp, store) = setup_test_store();
        let first = store.snapshot();
        store.rebuild().unwrap().unwrap();
        assert_eq!(*first, *store.snapshot());
        assert_eq!(store.generation(), 2);
    }

    #[test]
    fn test_fatal_error_keeps_previous_snapshot() {
        let source = Arc::new(
            MemorySource::new()
                .with_file("config.yaml", CONFIG)
                .with_file("blog/a.md", "---\ntitle: A\n---\n"),
        );
        let store = memory_store(source.clone());

        source.insert("stray.md", "no collection");
        let err = store.rebuild().unwrap_err();
        assert!(matches!(err, ContentError::AmbiguousPlacement { .. }));
        assert_eq!(ids(&store.get_collection("blog").unwrap()), vec!["a.md"]);

        source.remove("stray.md");
        source.insert("config.yaml", "blog:\n  schema:\n    title: nope\n");
        assert!(matches!(store.rebuild().unwrap_err(), ContentError::Config { .. }));
        assert_eq!(store.generation(), 1);
    }

    #[test]
    fn test_stale_ticket_not_published() {
        let source = Arc::new(MemorySource::new().with_file("blog/a.md", "A"));
        let store = memory_store(source.clone());

        let stale = store.begin_rebuild();
        let stale_output = store.build(&stale).unwrap();

        source.insert("blog/b.md", "B");
        let fresh = store.begin_rebuild();
        let fresh_output = store.build(&fresh).unwrap();

        assert!(store.publish(fresh, fresh_output));
        assert!(!store.publish(stale, stale_output));
        assert_eq!(ids(&store.get_collection("blog").unwrap()), vec!["a.md", "b.md"]);
    }

    #[test]
    fn test_no_config_means_schemaless() {
        let source = Arc::new(MemorySource::new().with_file("notes/x.md", "---\nanything: 1\n---\n"));
        let store = memory_store(source);
        let entry = store.get_entry("notes", "x.md").unwrap();
        assert_eq!(entry.data["anything"], 1);
        assert!(store.report().is_ok());
    }

    #[test]
    fn test_cache_reuse_and_invalidation() {
        let tmp = TempDir::new().unwrap();
        let source = Arc::new(
            MemorySource::new()
                .with_file("config.yaml", CONFIG)
                .with_file("blog/a.md", "---\ntitle: A\n---\n")
                .with_file("blog/b.md", "---\ntitle: B\nauthorContact: jeff\n---\n"),
        );
        let options = StoreOptions::default()
            .parallel(false)
            .cache_path(tmp.path().join("cache.db"));

        let uncached = memory_store(source.clone()).snapshot();

        let store = ContentStore::with_source(source.clone(), options.clone()).unwrap();
        assert_eq!(store.report().cache_hits, 0);

        let report = store.rebuild().unwrap().unwrap();
        assert_eq!(report.cache_hits, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(*store.snapshot(), *uncached);

        // A fresh store over the same cache file also reuses outcomes.
        let reopened = ContentStore::with_source(source.clone(), options).unwrap();
        assert_eq!(reopened.report().cache_hits, 2);

        source.insert("blog/a.md", "---\ntitle: A2\n---\n");
        let report = store.rebuild().unwrap().unwrap();
        assert_eq!(report.cache_hits, 1);
        assert_eq!(store.get_entry("blog", "a.md").unwrap().data["title"], "A2");

        source.insert("config.yaml", "blog: {}\n");
        let report = store.rebuild().unwrap().unwrap();
        assert_eq!(report.cache_hits, 0);
        assert!(report.is_ok());
    }

    #[test]
    fn test_cache_follows_content_not_mtime() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("blog")).unwrap();
        std::fs::write(root.join("config.yaml"), CONFIG).unwrap();
        let post = root.join("blog/post.md");
        std::fs::write(&post, "---\ntitle: T\nauthorContact: a@b.co\n---\n").unwrap();
        let mtime = std::fs::metadata(&post).unwrap().modified().unwrap();

        let options = StoreOptions::new(root).parallel(false).default_cache();
        drop(ContentStore::open(options.clone()).unwrap());

        // Same length and mtime, now an invalid email.
        std::fs::write(&post, "---\ntitle: T\nauthorContact: jeffxx\n---\n").unwrap();
        std::fs::File::options()
            .write(true)
            .open(&post)
            .unwrap()
            .set_modified(mtime)
            .unwrap();

        let cached = ContentStore::open(options).unwrap();
        let uncached = ContentStore::open(StoreOptions::new(root)).unwrap();
        assert_eq!(cached.report().cache_hits, 0);
        assert_eq!(cached.report().errors.len(), 1);
        assert!(cached.get_collection("blog").unwrap().is_empty());
        assert_eq!(*cached.snapshot(), *uncached.snapshot());
    }

    #[test]
    fn test_cache_from_other_engine_version_is_dropped() {
        let tmp = TempDir::new().unwrap();
        let cache_path = tmp.path().join("cache.db");
        let source = Arc::new(
            MemorySource::new()
                .with_file("config.yaml", CONFIG)
                .with_file("blog/a.md", "---\ntitle: A\n---\n"),
        );
        let options = StoreOptions::default()
            .parallel(false)
            .cache_path(&cache_path);
        drop(ContentStore::with_source(source.clone(), options.clone()).unwrap());

        // Rows written by an older release under the same configuration.
        {
            let cache = EntryCache::open(&cache_path).unwrap();
            let registry = SchemaRegistry::load(CONFIG).unwrap();
            cache
                .record_config(&format!("0.0.1:{}", registry.config_hash()), CONFIG)
                .unwrap();
        }

        let store = ContentStore::with_source(source, options).unwrap();
        assert_eq!(store.report().cache_hits, 0);
        assert_eq!(store.get_entry("blog", "a.md").unwrap().data["title"], "A");
    }

    /// Memory source that runs a callback once, at the start of the next scan.
    struct InterruptedSource {
        inner: MemorySource,
        on_scan: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    }

    impl ContentSource for InterruptedSource {
        fn scan(&self, options: &crate::scanner::ScanOptions) -> Result<crate::scanner::Scan> {
            if let Some(hook) = self.on_scan.lock().take() {
                hook();
            }
            self.inner.scan(options)
        }

        fn read(&self, file: &crate::scanner::ScannedFile) -> Result<String> {
            self.inner.read(file)
        }

        fn read_config(&self, file_name: &str) -> Result<Option<String>> {
            self.inner.read_config(file_name)
        }

        fn describe(&self) -> String {
            self.inner.describe()
        }
    }

    #[test]
    fn test_superseded_rebuild_returns_no_report() {
        let source = Arc::new(InterruptedSource {
            inner: MemorySource::new().with_file("blog/a.md", "A"),
            on_scan: Mutex::new(None),
        });
        let store = Arc::new(memory_store_with(source.clone()));

        let weak = Arc::downgrade(&store);
        *source.on_scan.lock() = Some(Box::new(move || {
            if let Some(store) = weak.upgrade() {
                store.begin_rebuild();
            }
        }));
        assert!(store.rebuild().unwrap().is_none());
        assert_eq!(store.generation(), 1);

        let report = store.rebuild().unwrap().unwrap();
        assert_eq!(report.generation, 4);
        assert_eq!(store.generation(), 4);
    }

    #[test]
    fn test_status() {
        let (_tmp, store) = setup_test_store();
        let status = store.status();
        assert_eq!(status["generation"], 1);
        assert_eq!(status["entries"], 3);
        assert_eq!(status["errors"], 1);
        assert_eq!(status["collections"]["blog"]["entries"], 2);
        assert_eq!(status["collections"]["blog"]["rejected"], 1);
        assert_eq!(status["collections"]["docs"]["schema"], false);
    }
}
