//! Snippet records and the builders used to create, patch and query them.
//!
//! Field names serialize in camelCase; this is the on-disk snapshot shape and
//! the export/import shape.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Field, SnipError};
use crate::sanitize::WILDCARD_FILE_TYPE;

/// Where a snippet is offered. Advisory only to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Global,
    Workspace,
    Project,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Workspace => "workspace",
            Scope::Project => "project",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = SnipError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(Scope::Global),
            "workspace" => Ok(Scope::Workspace),
            "project" => Ok(Scope::Project),
            other => Err(SnipError::validation(
                Field::Scope,
                format!("'{}' is not one of global, workspace, project", other),
            )),
        }
    }
}

/// A stored snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    /// Store-assigned identifier, never reused
    pub id: String,

    pub name: String,

    /// Shortcut token that expands to the body
    pub prefix: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub body: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub file_types: Vec<String>,

    #[serde(default)]
    pub scope: Scope,

    /// Weak reference to an external folder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub usage_count: u64,

    #[serde(default)]
    pub is_favorite: bool,
}

impl Snippet {
    /// Build a stored record from a validated draft.
    pub(crate) fn from_draft(id: String, draft: SnippetDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            prefix: draft.prefix,
            description: draft.description,
            body: draft.body,
            tags: draft.tags,
            file_types: draft.file_types,
            scope: draft.scope,
            folder_id: draft.folder_id,
            created_at: now,
            updated_at: now,
            usage_count: 0,
            is_favorite: draft.is_favorite,
        }
    }

    /// Merge a validated patch. Unset fields are left unchanged.
    pub(crate) fn apply(&mut self, patch: SnippetPatch, now: DateTime<Utc>) {
        let SnippetPatch {
            name,
            prefix,
            description,
            body,
            tags,
            file_types,
            scope,
            folder_id,
            is_favorite,
        } = patch;

        if let Some(value) = name {
            self.name = value;
        }
        if let Some(value) = prefix {
            self.prefix = value;
        }
        if let Some(value) = description {
            self.description = value;
        }
        if let Some(value) = body {
            self.body = value;
        }
        if let Some(value) = tags {
            self.tags = value;
        }
        if let Some(value) = file_types {
            self.file_types = value;
        }
        if let Some(value) = scope {
            self.scope = value;
        }
        if let Some(value) = folder_id {
            self.folder_id = value;
        }
        if let Some(value) = is_favorite {
            self.is_favorite = value;
        }
        self.touch(now);
    }

    /// Refresh `updated_at`, never moving it before `created_at`.
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.created_at);
    }

    /// Whether this snippet is offered for the given file type.
    pub fn applies_to(&self, file_type: &str) -> bool {
        self.file_types
            .iter()
            .any(|ft| ft == WILDCARD_FILE_TYPE || ft.eq_ignore_ascii_case(file_type))
    }

    /// Case-insensitive term match over name, prefix, description and tags.
    pub(crate) fn matches_term(&self, lowered_term: &str) -> bool {
        if lowered_term.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(lowered_term)
            || self.prefix.to_lowercase().contains(lowered_term)
            || self
                .description
                .as_deref()
                .map(|d| d.to_lowercase().contains(lowered_term))
                .unwrap_or(false)
            || self
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(lowered_term))
    }

    pub(crate) fn matches_filter(&self, filter: &SearchFilter) -> bool {
        if filter.favorites_only && !self.is_favorite {
            return false;
        }
        if !filter.tags.is_empty()
            && !filter
                .tags
                .iter()
                .any(|wanted| self.tags.iter().any(|tag| tag.eq_ignore_ascii_case(wanted)))
        {
            return false;
        }
        if !filter.file_types.is_empty() && !filter.file_types.iter().any(|ft| self.applies_to(ft))
        {
            return false;
        }
        true
    }
}

/// Input for creating a snippet.
#[derive(Debug, Clone, PartialEq)]
pub struct SnippetDraft {
    pub name: String,
    pub prefix: String,
    pub description: Option<String>,
    pub body: String,
    pub tags: Vec<String>,
    pub file_types: Vec<String>,
    pub scope: Scope,
    pub folder_id: Option<String>,
    pub is_favorite: bool,
}

impl SnippetDraft {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            description: None,
            body: body.into(),
            tags: Vec::new(),
            file_types: Vec::new(),
            scope: Scope::Global,
            folder_id: None,
            is_favorite: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_file_types(mut self, file_types: Vec<String>) -> Self {
        self.file_types = file_types;
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_folder(mut self, folder_id: impl Into<String>) -> Self {
        self.folder_id = Some(folder_id.into());
        self
    }

    pub fn favorite(mut self, is_favorite: bool) -> Self {
        self.is_favorite = is_favorite;
        self
    }
}

/// Partial update. `None` leaves a field unchanged; for the optional
/// fields, `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnippetPatch {
    pub name: Option<String>,
    pub prefix: Option<String>,
    pub description: Option<Option<String>>,
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
    pub file_types: Option<Vec<String>>,
    pub scope: Option<Scope>,
    pub folder_id: Option<Option<String>>,
    pub is_favorite: Option<bool>,
}

impl SnippetPatch {
    pub fn is_empty(&self) -> bool {
        *self == SnippetPatch::default()
    }

    /// Whether applying this patch can change folder membership.
    pub fn touches_folder(&self) -> bool {
        self.folder_id.is_some()
    }
}

/// Filters intersected with the search term.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Match any of these tags
    pub tags: Vec<String>,

    /// Match any of these file types
    pub file_types: Vec<String>,

    pub favorites_only: bool,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn file_type(mut self, file_type: impl Into<String>) -> Self {
        self.file_types.push(file_type.into());
        self
    }

    pub fn favorites_only(mut self) -> Self {
        self.favorites_only = true;
        self
    }
}

/// Aggregate numbers for the whole store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total_snippets: usize,
    pub total_usage: u64,
    pub snapshot_bytes: u64,
}

/// Why one import element was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportDiagnostic {
    /// Position in the source array
    pub index: usize,
    pub reason: String,
}

/// Outcome of a successful import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: Vec<ImportDiagnostic>,
    pub cleared: usize,
    /// Folders whose membership the import changed
    #[serde(skip)]
    pub folders: BTreeSet<String>,
}
