use crate::error::Result;
use crate::index::{CachedOutcome, FileOutcome, FileRecord, PreviousOutcomes};
use crate::scanner::ScannedFile;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Persistent per-file outcome cache, keyed by collection and entry id.
///
/// Rows are only meaningful under the configuration they were computed
/// with: the store compares the last recorded config hash and clears the
/// entries on mismatch.
pub struct EntryCache {
    conn: Connection,
}

impl EntryCache {
    /// Open or create the cache database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let cache = EntryCache { conn };
        cache.initialize_tables()?;
        Ok(cache)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = EntryCache { conn };
        cache.initialize_tables()?;
        Ok(cache)
    }

    fn initialize_tables(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS config_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                hash TEXT NOT NULL,
                config_yaml TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS entries (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                outcome_json TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (collection, id)
            );
            ",
        )?;
        Ok(())
    }

    // ── Config State ─────────────────────────────────────────────────

    /// Hash of the most recently recorded configuration.
    pub fn get_last_config_hash(&self) -> Result<Option<String>> {
        let result = self
            .conn
            .query_row(
                "SELECT hash FROM config_history ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(result)
    }

    pub fn record_config(&self, hash: &str, yaml: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO config_history (hash, config_yaml) VALUES (?1, ?2)",
            params![hash, yaml],
        )?;
        Ok(())
    }

    // ── Entry Outcomes ───────────────────────────────────────────────

    pub fn clear_entries(&self) -> Result<()> {
        self.conn.execute("DELETE FROM entries", [])?;
        Ok(())
    }

    pub fn entry_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Load every cached outcome. Rows that no longer deserialize are
    /// skipped and will simply be recomputed.
    pub fn load_entries(&self) -> Result<PreviousOutcomes> {
        let mut stmt = self
            .conn
            .prepare("SELECT collection, id, fingerprint, outcome_json FROM entries")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut outcomes = PreviousOutcomes::new();
        for row in rows {
            let (collection, id, fingerprint, outcome_json) = row?;
            match serde_json::from_str::<FileOutcome>(&outcome_json) {
                Ok(outcome) => {
                    outcomes.insert(
                        ScannedFile { collection, id },
                        CachedOutcome {
                            fingerprint,
                            outcome,
                        },
                    );
                }
                Err(e) => log::debug!("Dropping unreadable cache row {collection}/{id}: {e}"),
            }
        }
        Ok(outcomes)
    }

    /// Replace the cached outcomes with those of the latest build, in one
    /// transaction. Files without a fingerprint are not cached.
    pub fn replace_entries(&mut self, records: &[FileRecord]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM entries", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO entries (collection, id, fingerprint, outcome_json)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for record in records {
                let Some(fingerprint) = &record.fingerprint else {
                    continue;
                };
                let outcome_json = serde_json::to_string(&record.outcome)?;
                stmt.execute(params![
                    record.file.collection,
                    record.file.id,
                    fingerprint,
                    outcome_json
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::FieldError;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(collection: &str, id: &str, fingerprint: Option<&str>, outcome: FileOutcome) -> FileRecord {
        FileRecord {
            file: ScannedFile {
                collection: collection.into(),
                id: id.into(),
            },
            fingerprint: fingerprint.map(str::to_string),
            outcome,
        }
    }

    #[test]
    fn test_config_history() {
        let cache = EntryCache::open_in_memory().unwrap();
        assert!(cache.get_last_config_hash().unwrap().is_none());

        cache.record_config("abc123", "blog: {}").unwrap();
        cache.record_config("def456", "blog: {}\ndocs: {}").unwrap();
        assert_eq!(cache.get_last_config_hash().unwrap(), Some("def456".to_string()));
    }

    #[test]
    fn test_replace_and_load_entries() {
        let mut cache = EntryCache::open_in_memory().unwrap();
        let records = vec![
            record(
                "blog",
                "a.md",
                Some("fp-a"),
                FileOutcome::Entry {
                    data: json!({ "title": "A", "tags": ["x"] }),
                    body: "Body".into(),
                },
            ),
            record(
                "blog",
                "b.md",
                Some("fp-b"),
                FileOutcome::Invalid {
                    errors: vec![FieldError {
                        field: "title".into(),
                        expected: "string".into(),
                        actual: "missing".into(),
                    }],
                },
            ),
            record("blog", "c.md", None, FileOutcome::Parse { reason: "bad".into() }),
        ];
        cache.replace_entries(&records).unwrap();

        let loaded = cache.load_entries().unwrap();
        assert_eq!(loaded.len(), 2);
        let a = &loaded[&records[0].file];
        assert_eq!(a.fingerprint, "fp-a");
        assert_eq!(a.outcome, records[0].outcome);
        assert_eq!(loaded[&records[1].file].outcome, records[1].outcome);
    }

    #[test]
    fn test_replace_drops_removed_files() {
        let mut cache = EntryCache::open_in_memory().unwrap();
        let a = record("blog", "a.md", Some("1"), FileOutcome::Parse { reason: "x".into() });
        let b = record("blog", "b.md", Some("2"), FileOutcome::Parse { reason: "y".into() });
        cache.replace_entries(&[a.clone(), b]).unwrap();
        cache.replace_entries(&[a]).unwrap();
        assert_eq!(cache.entry_count().unwrap(), 1);

        cache.clear_entries().unwrap();
        assert_eq!(cache.entry_count().unwrap(), 0);
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".contentdb/cache.db");
        {
            let cache = EntryCache::open(&path).unwrap();
            cache.record_config("h", "").unwrap();
        }
        let reopened = EntryCache::open(&path).unwrap();
        assert_eq!(reopened.get_last_config_hash().unwrap(), Some("h".to_string()));
    }
}
