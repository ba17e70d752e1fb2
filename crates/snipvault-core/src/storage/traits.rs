//! Repository trait definition.
//!
//! The `SnippetRepository` trait is the surface the manager delegates to once
//! access has been granted. Every caller-facing method is metered by the
//! implementation's rate limiter under its own operation key.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::snippet::{ImportReport, SearchFilter, Snippet, SnippetDraft, SnippetPatch, StoreStats};

/// Operation keys used for rate limiting.
pub mod operations {
    pub const GET_ALL: &str = "getAll";
    pub const GET_BY_ID: &str = "getById";
    pub const CREATE: &str = "create";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
    pub const INCREMENT_USAGE: &str = "incrementUsage";
    pub const SEARCH: &str = "search";
    pub const STATS: &str = "stats";
    pub const EXPORT_ALL: &str = "exportAll";
    pub const IMPORT_ALL: &str = "importAll";
}

/// Durable snippet storage.
///
/// All implementations must ensure:
/// - identifiers are generated by the store and never reused
/// - a failed write leaves the visible state unchanged
/// - mutating calls are serialized
#[async_trait]
pub trait SnippetRepository: Send + Sync {
    /// Prepare the storage location and load existing records.
    ///
    /// # Errors
    ///
    /// Returns `SnipError::Storage` only if the storage location cannot be
    /// created. Unreadable snapshots fall back to the backup, then to an
    /// empty store.
    async fn initialize(&self) -> Result<()>;

    /// All records, oldest first.
    async fn get_all(&self) -> Result<Vec<Snippet>>;

    /// Returns `Ok(None)` if the id is unknown.
    async fn get_by_id(&self, id: &str) -> Result<Option<Snippet>>;

    /// Insert a new record with a fresh id and timestamps.
    ///
    /// # Errors
    ///
    /// Returns `SnipError::Validation` if the draft fails sanitizer rules.
    async fn create(&self, draft: SnippetDraft) -> Result<Snippet>;

    /// Merge `patch` into an existing record.
    ///
    /// # Errors
    ///
    /// Returns `SnipError::NotFound` if the id is unknown.
    async fn update(&self, id: &str, patch: SnippetPatch) -> Result<Snippet> {
        Ok(self.update_with_previous(id, patch).await?.1)
    }

    /// Like [`SnippetRepository::update`], but also returns the record as it
    /// was immediately before the merge, read under the same write.
    async fn update_with_previous(
        &self,
        id: &str,
        patch: SnippetPatch,
    ) -> Result<(Snippet, Snippet)>;

    /// Remove a record, returning it.
    ///
    /// # Errors
    ///
    /// Returns `SnipError::NotFound` if the id is unknown.
    async fn delete(&self, id: &str) -> Result<Snippet>;

    /// Bump the usage counter. Unknown ids are ignored and yield `Ok(None)`.
    async fn increment_usage(&self, id: &str) -> Result<Option<Snippet>>;

    /// Case-insensitive search intersected with `filter`.
    async fn search(&self, term: &str, filter: &SearchFilter) -> Result<Vec<Snippet>>;

    async fn stats(&self) -> Result<StoreStats>;

    /// Write every record to `destination`, returning the count.
    async fn export_all(&self, destination: &Path) -> Result<usize>;

    /// Import records from export-format JSON text.
    ///
    /// # Errors
    ///
    /// Returns `SnipError::ImportRejected` for batch-level failures,
    /// including when no element passes validation. The store is unchanged
    /// in that case even when `clear_existing` is set.
    async fn import_all(&self, source: &str, clear_existing: bool) -> Result<ImportReport>;

    /// Current record count for each of `folders`.
    ///
    /// Bookkeeping read used after mutations; not metered.
    async fn folder_counts(&self, folders: &BTreeSet<String>) -> Result<BTreeMap<String, usize>>;
}
