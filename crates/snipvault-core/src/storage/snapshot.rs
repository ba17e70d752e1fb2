//! JSON snapshot storage with backup rotation.
//!
//! The full record collection lives in memory and is rewritten to
//! `snippets.json` after every mutation. Before each rewrite the previous
//! snapshot is copied verbatim to `snippets.backup.json`, so the backup always
//! holds the last complete prior state. Loading prefers the primary snapshot
//! and falls back to the backup only when the primary cannot be read or
//! parsed.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::{ImportRejection, Result, SnipError};
use crate::fs::{copy_atomic, write_atomic};
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::sanitize::{validate_draft, validate_patch, FieldLimits};
use crate::snippet::{ImportReport, SearchFilter, Snippet, SnippetDraft, SnippetPatch, StoreStats};

use super::import::parse_batch;
use super::traits::{operations, SnippetRepository};

/// Primary snapshot filename.
pub const SNAPSHOT_FILE: &str = "snippets.json";

/// Backup snapshot filename.
pub const BACKUP_FILE: &str = "snippets.backup.json";

type RecordMap = BTreeMap<String, Snippet>;

/// Locations of the snapshot pair inside a storage directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPaths {
    pub dir: PathBuf,
    pub snapshot: PathBuf,
    pub backup: PathBuf,
}

impl SnapshotPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            snapshot: dir.join(SNAPSHOT_FILE),
            backup: dir.join(BACKUP_FILE),
            dir,
        }
    }
}

/// Which file `initialize` loaded records from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Snapshot,
    Backup,
    Empty,
}

/// Snapshot-backed snippet repository.
pub struct SnapshotStore {
    paths: SnapshotPaths,
    records: RwLock<Arc<RecordMap>>,
    write_lock: Mutex<()>,
    load_source: RwLock<Option<LoadSource>>,
    limiter: RateLimiter,
    clock: Arc<dyn Clock>,
}

impl SnapshotStore {
    /// Create a store rooted at `dir` with default limits and the system clock.
    ///
    /// Nothing touches disk until [`SnippetRepository::initialize`].
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            paths: SnapshotPaths::new(dir),
            records: RwLock::new(Arc::new(RecordMap::new())),
            write_lock: Mutex::new(()),
            load_source: RwLock::new(None),
            limiter: RateLimiter::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.limiter = RateLimiter::new(config);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn paths(&self) -> &SnapshotPaths {
        &self.paths
    }

    /// Where the last `initialize` found its records, if it has run.
    pub fn load_source(&self) -> Option<LoadSource> {
        self.load_source.read().ok().and_then(|guard| *guard)
    }

    fn current(&self) -> Result<Arc<RecordMap>> {
        self.records
            .read()
            .map(|guard| Arc::clone(&guard))
            .map_err(|_| SnipError::Storage("Record map poisoned".to_string()))
    }

    fn publish(&self, next: RecordMap) -> Result<()> {
        let mut guard = self
            .records
            .write()
            .map_err(|_| SnipError::Storage("Record map poisoned".to_string()))?;
        *guard = Arc::new(next);
        Ok(())
    }

    fn meter(&self, operation: &str) -> Result<DateTime<Utc>> {
        let now = self.clock.now();
        self.limiter.check(operation, now)?;
        Ok(now)
    }

    /// Persist `next` and make it visible. Callers must hold `write_lock`.
    async fn commit(&self, next: RecordMap) -> Result<()> {
        let bytes = serialize_records(&next)?;
        let paths = self.paths.clone();
        tokio::task::spawn_blocking(move || rotate_and_write(&paths, &bytes))
            .await
            .map_err(|e| SnipError::Storage(format!("Snapshot writer panicked: {}", e)))?
            .map_err(|e| SnipError::Storage(format!("Snapshot write failed: {}", e)))?;
        self.publish(next)
    }

    fn new_id(&self, taken: &RecordMap) -> String {
        loop {
            let id = Uuid::now_v7().to_string();
            if !taken.contains_key(&id) {
                return id;
            }
        }
    }
}

#[async_trait]
impl SnippetRepository for SnapshotStore {
    async fn initialize(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.paths.dir).await.map_err(|e| {
            SnipError::Storage(format!(
                "Failed to create storage directory {}: {}",
                self.paths.dir.display(),
                e
            ))
        })?;

        let _guard = self.write_lock.lock().await;
        let (records, source) = match read_snapshot(&self.paths.snapshot).await {
            Ok(records) => (records, LoadSource::Snapshot),
            Err(primary_err) => {
                if primary_err.kind() != io::ErrorKind::NotFound {
                    warn!(
                        path = %self.paths.snapshot.display(),
                        error = %primary_err,
                        "snapshot unreadable, trying backup"
                    );
                }
                match read_snapshot(&self.paths.backup).await {
                    Ok(records) => {
                        info!(count = records.len(), "recovered snippets from backup");
                        (records, LoadSource::Backup)
                    }
                    Err(backup_err) => {
                        if backup_err.kind() != io::ErrorKind::NotFound {
                            warn!(error = %backup_err, "backup unreadable, starting empty");
                        }
                        (RecordMap::new(), LoadSource::Empty)
                    }
                }
            }
        };

        debug!(count = records.len(), source = ?source, "snippet store loaded");
        self.publish(records)?;
        if let Ok(mut guard) = self.load_source.write() {
            *guard = Some(source);
        }
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<Snippet>> {
        self.meter(operations::GET_ALL)?;
        Ok(self.current()?.values().cloned().collect())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Snippet>> {
        self.meter(operations::GET_BY_ID)?;
        Ok(self.current()?.get(id).cloned())
    }

    async fn create(&self, draft: SnippetDraft) -> Result<Snippet> {
        self.meter(operations::CREATE)?;
        let draft = validate_draft(&draft, &FieldLimits::CREATE)?;

        let _guard = self.write_lock.lock().await;
        let mut next = (*self.current()?).clone();
        let id = self.new_id(&next);
        let snippet = Snippet::from_draft(id.clone(), draft, self.clock.now());
        next.insert(id, snippet.clone());
        self.commit(next).await?;

        debug!(id = %snippet.id, "snippet created");
        Ok(snippet)
    }

    async fn update_with_previous(
        &self,
        id: &str,
        patch: SnippetPatch,
    ) -> Result<(Snippet, Snippet)> {
        self.meter(operations::UPDATE)?;
        let patch = validate_patch(&patch)?;

        let _guard = self.write_lock.lock().await;
        let mut next = (*self.current()?).clone();
        let snippet = next
            .get_mut(id)
            .ok_or_else(|| SnipError::NotFound(id.to_string()))?;
        let previous = snippet.clone();
        snippet.apply(patch, self.clock.now());
        let updated = snippet.clone();
        self.commit(next).await?;

        debug!(id, "snippet updated");
        Ok((previous, updated))
    }

    async fn delete(&self, id: &str) -> Result<Snippet> {
        self.meter(operations::DELETE)?;

        let _guard = self.write_lock.lock().await;
        let mut next = (*self.current()?).clone();
        let removed = next
            .remove(id)
            .ok_or_else(|| SnipError::NotFound(id.to_string()))?;
        self.commit(next).await?;

        debug!(id, "snippet deleted");
        Ok(removed)
    }

    async fn increment_usage(&self, id: &str) -> Result<Option<Snippet>> {
        self.meter(operations::INCREMENT_USAGE)?;

        let _guard = self.write_lock.lock().await;
        let mut next = (*self.current()?).clone();
        let Some(snippet) = next.get_mut(id) else {
            debug!(id, "usage increment for unknown snippet ignored");
            return Ok(None);
        };
        snippet.usage_count = snippet.usage_count.saturating_add(1);
        snippet.touch(self.clock.now());
        let updated = snippet.clone();
        self.commit(next).await?;
        Ok(Some(updated))
    }

    async fn search(&self, term: &str, filter: &SearchFilter) -> Result<Vec<Snippet>> {
        self.meter(operations::SEARCH)?;
        let lowered = term.trim().to_lowercase();
        Ok(self
            .current()?
            .values()
            .filter(|s| s.matches_term(&lowered) && s.matches_filter(filter))
            .cloned()
            .collect())
    }

    async fn stats(&self) -> Result<StoreStats> {
        self.meter(operations::STATS)?;
        let records = self.current()?;
        let snapshot_bytes = match tokio::fs::metadata(&self.paths.snapshot).await {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => 0,
            Err(err) => return Err(err.into()),
        };
        Ok(StoreStats {
            total_snippets: records.len(),
            total_usage: records.values().map(|s| s.usage_count).sum(),
            snapshot_bytes,
        })
    }

    async fn export_all(&self, destination: &Path) -> Result<usize> {
        self.meter(operations::EXPORT_ALL)?;
        let records = self.current()?;
        let bytes = serialize_records(&records)?;
        let destination = destination.to_path_buf();
        tokio::task::spawn_blocking(move || {
            if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            write_atomic(&destination, &bytes)
        })
        .await
        .map_err(|e| SnipError::Storage(format!("Export writer panicked: {}", e)))?
        .map_err(|e| SnipError::Storage(format!("Export failed: {}", e)))?;

        info!(count = records.len(), "snippets exported");
        Ok(records.len())
    }

    async fn import_all(&self, source: &str, clear_existing: bool) -> Result<ImportReport> {
        self.meter(operations::IMPORT_ALL)?;
        let batch = parse_batch(source)?;
        for diagnostic in &batch.skipped {
            warn!(index = diagnostic.index, reason = %diagnostic.reason, "import element skipped");
        }
        if batch.accepted.is_empty() {
            return Err(SnipError::ImportRejected(ImportRejection::NoValidRecords {
                skipped: batch.skipped.len(),
            }));
        }

        let _guard = self.write_lock.lock().await;
        let current = self.current()?;
        let mut folders = BTreeSet::new();
        let cleared = if clear_existing { current.len() } else { 0 };
        let mut next = if clear_existing {
            folders.extend(current.values().filter_map(|s| s.folder_id.clone()));
            RecordMap::new()
        } else {
            (*current).clone()
        };

        let now = self.clock.now();
        let imported = batch.accepted.len();
        for accepted in batch.accepted {
            let id = self.new_id(&next);
            let mut snippet = Snippet::from_draft(id.clone(), accepted.draft, now);
            snippet.usage_count = accepted.usage_count;
            folders.extend(snippet.folder_id.clone());
            next.insert(id, snippet);
        }
        self.commit(next).await?;

        info!(imported, skipped = batch.skipped.len(), cleared, "snippets imported");
        Ok(ImportReport {
            imported,
            skipped: batch.skipped,
            cleared,
            folders,
        })
    }

    async fn folder_counts(&self, folders: &BTreeSet<String>) -> Result<BTreeMap<String, usize>> {
        let records = self.current()?;
        let mut counts: BTreeMap<String, usize> =
            folders.iter().map(|f| (f.clone(), 0)).collect();
        for folder in records.values().filter_map(|s| s.folder_id.as_ref()) {
            if let Some(count) = counts.get_mut(folder) {
                *count += 1;
            }
        }
        Ok(counts)
    }
}

fn serialize_records(records: &RecordMap) -> Result<Vec<u8>> {
    let list: Vec<&Snippet> = records.values().collect();
    Ok(serde_json::to_vec_pretty(&list)?)
}

async fn read_snapshot(path: &Path) -> io::Result<RecordMap> {
    let bytes = tokio::fs::read(path).await?;
    let list: Vec<Snippet> = serde_json::from_slice(&bytes)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(list.into_iter().map(|s| (s.id.clone(), s)).collect())
}

fn rotate_and_write(paths: &SnapshotPaths, bytes: &[u8]) -> io::Result<()> {
    if paths.snapshot.exists() {
        copy_atomic(&paths.snapshot, &paths.backup)?;
    }
    write_atomic(&paths.snapshot, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Duration;
    use tempfile::tempdir;

    async fn store_in(dir: &Path) -> SnapshotStore {
        let store = SnapshotStore::new(dir);
        store.initialize().await.unwrap();
        store
    }

    fn draft(name: &str, prefix: &str) -> SnippetDraft {
        SnippetDraft::new(name, prefix, format!("body of {name}"))
    }

    #[tokio::test]
    async fn test_initialize_creates_directory_and_starts_empty() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("nested").join("store");
        let store = store_in(&root).await;

        assert!(root.is_dir());
        assert_eq!(store.load_source(), Some(LoadSource::Empty));
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_assigns_distinct_ids_and_persists() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path()).await;

        let a = store.create(draft("A", "a")).await.unwrap();
        let b = store.create(draft("B", "b")).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.created_at, a.updated_at);

        let reopened = store_in(dir.path()).await;
        assert_eq!(reopened.load_source(), Some(LoadSource::Snapshot));
        let names: Vec<String> = reopened
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_update_refreshes_updated_at_only() {
        let dir = tempdir().unwrap();
        let clock = Arc::new(ManualClock::default());
        let store = SnapshotStore::new(dir.path()).with_clock(clock.clone());
        store.initialize().await.unwrap();

        let created = store.create(draft("A", "a")).await.unwrap();
        clock.advance(Duration::minutes(3));
        let updated = store
            .update(
                &created.id,
                SnippetPatch {
                    is_favorite: Some(true),
                    ..SnippetPatch::default()
                },
            )
            .await
            .unwrap();

        assert!(updated.is_favorite);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.updated_at, created.created_at + Duration::minutes(3));
        assert_eq!(updated.body, created.body);
    }

    #[tokio::test]
    async fn test_update_with_previous_returns_pre_image() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path()).await;
        let created = store
            .create(draft("A", "a").with_folder("work"))
            .await
            .unwrap();

        let (previous, updated) = store
            .update_with_previous(
                &created.id,
                SnippetPatch {
                    folder_id: Some(Some("home".to_string())),
                    ..SnippetPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(previous, created);
        assert_eq!(updated.folder_id.as_deref(), Some("home"));

        let folders = ["home", "work"].iter().map(|f| f.to_string()).collect();
        let counts = store.folder_counts(&folders).await.unwrap();
        assert_eq!(counts.get("home"), Some(&1));
        assert_eq!(counts.get("work"), Some(&0));
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_are_not_found() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path()).await;

        let err = store
            .update("nope", SnippetPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SnipError::NotFound(ref id) if id == "nope"));
        assert!(matches!(
            store.delete("nope").await.unwrap_err(),
            SnipError::NotFound(_)
        ));
        assert!(!store.paths().snapshot.exists());
    }

    #[tokio::test]
    async fn test_increment_usage_missing_is_noop() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path()).await;
        let created = store.create(draft("A", "a")).await.unwrap();
        let before = std::fs::read(&store.paths().snapshot).unwrap();

        assert!(store.increment_usage("ghost").await.unwrap().is_none());
        assert_eq!(std::fs::read(&store.paths().snapshot).unwrap(), before);

        let bumped = store.increment_usage(&created.id).await.unwrap().unwrap();
        assert_eq!(bumped.usage_count, 1);
    }

    #[tokio::test]
    async fn test_invalid_create_leaves_store_unchanged() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path()).await;

        let bad = SnippetDraft::new("XSS", "xss", "javascript:alert(document.cookie)");
        let err = store.create(bad).await.unwrap_err();
        assert!(err.to_string().contains("javascript:"));
        assert_eq!(store.stats().await.unwrap().total_snippets, 0);
    }

    #[tokio::test]
    async fn test_stats_reports_usage_and_size() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path()).await;
        let a = store.create(draft("A", "a")).await.unwrap();
        store.create(draft("B", "b")).await.unwrap();
        store.increment_usage(&a.id).await.unwrap();
        store.increment_usage(&a.id).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_snippets, 2);
        assert_eq!(stats.total_usage, 2);
        assert_eq!(
            stats.snapshot_bytes,
            std::fs::metadata(&store.paths().snapshot).unwrap().len()
        );
    }

    #[tokio::test]
    async fn test_rate_limit_applies_per_operation() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path()).with_rate_limit(RateLimitConfig {
            window: std::time::Duration::from_secs(60),
            max_calls: 2,
        });
        store.initialize().await.unwrap();

        store.get_all().await.unwrap();
        store.get_all().await.unwrap();
        assert!(matches!(
            store.get_all().await.unwrap_err(),
            SnipError::RateLimitExceeded { .. }
        ));
        assert!(store.get_by_id("x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_export_writes_snapshot_shape() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path()).await;
        store.create(draft("A", "a")).await.unwrap();

        let out = dir.path().join("exports").join("all.json");
        assert_eq!(store.export_all(&out).await.unwrap(), 1);

        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&out).unwrap()).unwrap();
        let array = value.as_array().unwrap();
        assert_eq!(array[0].get("prefix").and_then(|v| v.as_str()), Some("a"));
        assert!(array[0].get("createdAt").is_some());
    }
}
