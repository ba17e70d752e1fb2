//! Bulk import parsing and per-element validation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::error::{ImportRejection, Result, SnipError};
use crate::sanitize::{validate_draft, FieldLimits};
use crate::snippet::{ImportDiagnostic, Scope, SnippetDraft};

/// Maximum import source size in bytes.
pub const MAX_IMPORT_BYTES: usize = 10 * 1024 * 1024;

/// Maximum elements in an import array.
pub const MAX_IMPORT_RECORDS: usize = 10_000;

const PROTO_MARKER: &str = "__proto__";

static POLLUTION_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""\s*(constructor|prototype)\s*"\s*:"#).expect("pollution pattern is valid")
});

/// One element as it appears in an export file.
///
/// `id`, `createdAt` and `updatedAt` are ignored: imported snippets always
/// get a fresh identity and fresh timestamps.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportCandidate {
    name: String,
    prefix: String,
    body: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    file_types: Vec<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    folder_id: Option<String>,
    #[serde(default)]
    usage_count: Option<u64>,
    #[serde(default)]
    is_favorite: bool,
}

/// An element that passed validation.
#[derive(Debug, Clone)]
pub(crate) struct AcceptedImport {
    pub draft: SnippetDraft,
    pub usage_count: u64,
}

/// Elements split into accepted and skipped.
#[derive(Debug, Default)]
pub(crate) struct ImportBatch {
    pub accepted: Vec<AcceptedImport>,
    pub skipped: Vec<ImportDiagnostic>,
}

/// Apply the batch-level checks and validate each element.
///
/// Batch-level failures return `ImportRejected`; element failures are
/// collected into `skipped`.
pub(crate) fn parse_batch(source: &str) -> Result<ImportBatch> {
    if source.len() > MAX_IMPORT_BYTES {
        return Err(reject(ImportRejection::TooLarge {
            bytes: source.len(),
            max: MAX_IMPORT_BYTES,
        }));
    }
    if let Some(marker) = pollution_marker(source) {
        return Err(reject(ImportRejection::PollutionMarker(marker)));
    }

    let value: serde_json::Value = serde_json::from_str(source)
        .map_err(|e| reject(ImportRejection::Malformed(e.to_string())))?;
    let elements = match value {
        serde_json::Value::Array(elements) => elements,
        _ => return Err(reject(ImportRejection::NotAnArray)),
    };
    if elements.len() > MAX_IMPORT_RECORDS {
        return Err(reject(ImportRejection::TooManyRecords {
            count: elements.len(),
            max: MAX_IMPORT_RECORDS,
        }));
    }

    let mut batch = ImportBatch::default();
    for (index, element) in elements.into_iter().enumerate() {
        match validate_element(element) {
            Ok(accepted) => batch.accepted.push(accepted),
            Err(reason) => batch.skipped.push(ImportDiagnostic { index, reason }),
        }
    }
    Ok(batch)
}

fn validate_element(element: serde_json::Value) -> std::result::Result<AcceptedImport, String> {
    if !element.is_object() {
        return Err("element is not an object".to_string());
    }
    let candidate: ImportCandidate =
        serde_json::from_value(element).map_err(|e| e.to_string())?;

    let scope = match candidate.scope.as_deref() {
        Some(value) => value.parse::<Scope>().map_err(|e| e.to_string())?,
        None => Scope::default(),
    };
    let draft = SnippetDraft {
        name: candidate.name,
        prefix: candidate.prefix,
        description: candidate.description,
        body: candidate.body,
        tags: candidate.tags,
        file_types: candidate.file_types,
        scope,
        folder_id: candidate.folder_id.filter(|id| !id.trim().is_empty()),
        is_favorite: candidate.is_favorite,
    };
    let draft = validate_draft(&draft, &FieldLimits::IMPORT).map_err(|e| e.to_string())?;

    Ok(AcceptedImport {
        draft,
        usage_count: candidate.usage_count.unwrap_or(0),
    })
}

fn pollution_marker(source: &str) -> Option<&'static str> {
    if source.contains(PROTO_MARKER) {
        return Some(PROTO_MARKER);
    }
    POLLUTION_KEY
        .captures(source)
        .and_then(|caps| caps.get(1))
        .map(|m| match m.as_str() {
            "constructor" => "constructor",
            _ => "prototype",
        })
}

fn reject(reason: ImportRejection) -> SnipError {
    SnipError::ImportRejected(reason)
}
