//! Gated snippet manager.
//!
//! Ties the store to the access gate: every call checks access first, then
//! sanitizes input, then delegates. Mutations that change folder membership
//! push fresh counts to the folder collaborator when one is attached.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::{debug, warn};

use crate::access::{AccessDecision, AccessGate, AccessSession, GateState};
use crate::error::{Result, SnipError};
use crate::sanitize::{validate_draft, validate_patch, FieldLimits};
use crate::snippet::{ImportReport, SearchFilter, Snippet, SnippetDraft, SnippetPatch, StoreStats};
use crate::storage::SnippetRepository;

/// Receives per-folder snippet counts.
#[async_trait]
pub trait FolderCounts: Send + Sync {
    async fn set_count(&self, folder_id: &str, count: usize) -> Result<()>;
}

/// PIN status for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinStatus {
    pub state: GateState,
    pub session: AccessSession,
}

/// Composition root over one store and one gate.
pub struct SnippetManager<R> {
    store: R,
    gate: AccessGate,
    folders: Option<Arc<dyn FolderCounts>>,
}

impl<R: SnippetRepository> SnippetManager<R> {
    pub fn new(store: R, gate: AccessGate) -> Self {
        Self {
            store,
            gate,
            folders: None,
        }
    }

    pub fn with_folder_counts(mut self, folders: Arc<dyn FolderCounts>) -> Self {
        self.folders = Some(folders);
        self
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    /// Load records and the persisted session, then start the expiry sweep.
    pub async fn initialize(&self) -> Result<()> {
        self.store.initialize().await?;
        self.gate.load().await?;
        if self.gate.state().await != GateState::Disabled {
            self.gate.start_sweep();
        }
        Ok(())
    }

    pub async fn check_access(&self) -> Result<AccessDecision> {
        self.gate.check_access().await
    }

    async fn guard(&self) -> Result<()> {
        self.gate.check_access().await?.into_result()
    }

    pub async fn get_all(&self) -> Result<Vec<Snippet>> {
        self.guard().await?;
        self.store.get_all().await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Snippet>> {
        self.guard().await?;
        self.store.get_by_id(id).await
    }

    pub async fn create(&self, draft: SnippetDraft) -> Result<Snippet> {
        self.guard().await?;
        let draft = validate_draft(&draft, &FieldLimits::CREATE)?;
        let created = self.store.create(draft).await?;
        self.refresh_folders(created.folder_id.iter().cloned().collect())
            .await;
        Ok(created)
    }

    pub async fn update(&self, id: &str, patch: SnippetPatch) -> Result<Snippet> {
        self.guard().await?;
        let patch = validate_patch(&patch)?;
        let touches_folder = patch.touches_folder();
        let (previous, updated) = self.store.update_with_previous(id, patch).await?;

        if touches_folder {
            let affected = previous
                .folder_id
                .into_iter()
                .chain(updated.folder_id.iter().cloned())
                .collect();
            self.refresh_folders(affected).await;
        }
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<Snippet> {
        self.guard().await?;
        let removed = self.store.delete(id).await?;
        self.refresh_folders(removed.folder_id.iter().cloned().collect())
            .await;
        Ok(removed)
    }

    pub async fn increment_usage(&self, id: &str) -> Result<Option<Snippet>> {
        self.guard().await?;
        self.store.increment_usage(id).await
    }

    pub async fn search(&self, term: &str, filter: &SearchFilter) -> Result<Vec<Snippet>> {
        self.guard().await?;
        self.store.search(term, filter).await
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        self.guard().await?;
        self.store.stats().await
    }

    pub async fn export_all(&self, destination: &Path) -> Result<usize> {
        self.guard().await?;
        self.store.export_all(destination).await
    }

    pub async fn import_all(&self, source: &str, clear_existing: bool) -> Result<ImportReport> {
        self.guard().await?;
        let report = self.store.import_all(source, clear_existing).await?;
        self.refresh_folders(report.folders.clone()).await;
        Ok(report)
    }

    /// Turn the PIN on, or replace it from an unlocked session.
    pub async fn set_pin(&self, pin: &SecretString) -> Result<()> {
        if self.gate.state().await != GateState::Disabled {
            self.guard().await?;
        }
        self.gate.configure_pin(pin).await
    }

    pub async fn change_pin(&self, current: &SecretString, new_pin: &SecretString) -> Result<()> {
        self.gate.change_pin(current, new_pin).await
    }

    pub async fn disable_pin(&self, current: &SecretString) -> Result<()> {
        self.gate.disable_pin(current).await
    }

    /// End the current session; the next call prompts for the PIN.
    pub async fn lock(&self) -> Result<()> {
        if self.gate.state().await == GateState::Disabled {
            return Err(SnipError::AccessDenied("No PIN is configured".to_string()));
        }
        self.gate.reset_session().await
    }

    pub async fn recover(&self) -> Result<AccessDecision> {
        self.gate.recover().await
    }

    pub async fn pin_status(&self) -> PinStatus {
        PinStatus {
            state: self.gate.state().await,
            session: self.gate.session().await,
        }
    }

    /// Stop background work. Also happens on drop.
    pub fn shutdown(&self) {
        self.gate.stop_sweep();
    }

    /// Push counts for `folders`. Failures are logged; the mutation that
    /// triggered the refresh has already been committed.
    async fn refresh_folders(&self, folders: BTreeSet<String>) {
        let Some(sink) = self.folders.as_ref() else {
            return;
        };
        if folders.is_empty() {
            return;
        }
        let counts = match self.store.folder_counts(&folders).await {
            Ok(counts) => counts,
            Err(err) => {
                warn!(error = %err, "folder count refresh skipped");
                return;
            }
        };
        for (folder, count) in counts {
            if let Err(err) = sink.set_count(&folder, count).await {
                warn!(folder = %folder, error = %err, "folder count update failed");
            } else {
                debug!(folder = %folder, count, "folder count updated");
            }
        }
    }
}

impl<R> Drop for SnippetManager<R> {
    fn drop(&mut self) {
        self.gate.stop_sweep();
    }
}
