//! Input sanitization shared by direct creation, partial updates and import.
//!
//! Every predicate is pure. Interactive prompts call the single-field
//! validators and stop at the first failure; bulk import calls
//! [`validate_draft`] once per element and records the verdict.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Field, Result, SnipError};
use crate::snippet::{SnippetDraft, SnippetPatch};

/// Maximum characters in a snippet name.
pub const MAX_NAME_CHARS: usize = 200;

/// Maximum characters in a prefix.
pub const MAX_PREFIX_CHARS: usize = 50;

/// Maximum characters in a description.
pub const MAX_DESCRIPTION_CHARS: usize = 1_000;

/// Maximum tags per snippet.
pub const MAX_TAGS: usize = 20;

/// Maximum characters per tag.
pub const MAX_TAG_CHARS: usize = 50;

/// Maximum characters per file type.
pub const MAX_FILE_TYPE_CHARS: usize = 20;

/// File type that matches every file.
pub const WILDCARD_FILE_TYPE: &str = "*";

/// Case-insensitive substrings rejected in every text field.
pub const DENYLIST: &[&str] = &[
    "javascript:",
    "vbscript:",
    "data:text/html",
    "<script",
    "</script",
    "onload=",
    "onerror=",
    "onclick=",
    "onmouseover=",
    "onfocus=",
    "../",
    "..\\",
    "/etc/passwd",
    "/etc/shadow",
    "c:\\windows\\system32",
];

static MARKUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"</?[A-Za-z!?][^<>]*>").expect("markup pattern is valid")
});

/// Ceilings that differ between direct creation and import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLimits {
    pub max_body_chars: usize,
    pub max_file_types: usize,
}

impl FieldLimits {
    /// Limits for snippets created or edited directly.
    pub const CREATE: FieldLimits = FieldLimits {
        max_body_chars: 10_000,
        max_file_types: 10,
    };

    /// Limits for snippets arriving through bulk import.
    pub const IMPORT: FieldLimits = FieldLimits {
        max_body_chars: 100_000,
        max_file_types: 20,
    };
}

impl Default for FieldLimits {
    fn default() -> Self {
        FieldLimits::CREATE
    }
}

pub fn validate_name(name: &str) -> Result<()> {
    require_non_empty(Field::Name, name)?;
    check_length(Field::Name, name, MAX_NAME_CHARS)?;
    reject_markup(Field::Name, name)?;
    scan_denylist(Field::Name, name)
}

pub fn validate_prefix(prefix: &str) -> Result<()> {
    require_non_empty(Field::Prefix, prefix)?;
    check_length(Field::Prefix, prefix, MAX_PREFIX_CHARS)?;
    if !prefix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(SnipError::validation(
            Field::Prefix,
            "may only contain letters, digits, '_' and '-'",
        ));
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<()> {
    check_length(Field::Description, description, MAX_DESCRIPTION_CHARS)?;
    reject_markup(Field::Description, description)?;
    scan_denylist(Field::Description, description)
}

pub fn validate_body(body: &str, limits: &FieldLimits) -> Result<()> {
    require_non_empty(Field::Body, body)?;
    check_length(Field::Body, body, limits.max_body_chars)?;
    scan_denylist(Field::Body, body)
}

pub fn validate_tag(tag: &str) -> Result<()> {
    require_non_empty(Field::Tag, tag)?;
    check_length(Field::Tag, tag, MAX_TAG_CHARS)?;
    reject_markup(Field::Tag, tag)?;
    scan_denylist(Field::Tag, tag)
}

pub fn validate_file_type(file_type: &str) -> Result<()> {
    require_non_empty(Field::FileType, file_type)?;
    if file_type == WILDCARD_FILE_TYPE {
        return Ok(());
    }
    check_length(Field::FileType, file_type, MAX_FILE_TYPE_CHARS)?;
    if !file_type
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
    {
        return Err(SnipError::validation(
            Field::FileType,
            format!(
                "'{}' may only contain letters, digits, '.', '_' and '-'",
                file_type
            ),
        ));
    }
    scan_denylist(Field::FileType, file_type)
}

/// Validate and normalize tags.
///
/// - Trims whitespace
/// - Removes duplicates, keeping first occurrence order
/// - Enforces count and per-tag limits
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>> {
    if tags.len() > MAX_TAGS {
        return Err(SnipError::validation(
            Field::Tags,
            format!("too many tags ({}, max {})", tags.len(), MAX_TAGS),
        ));
    }

    let mut seen = HashSet::with_capacity(tags.len());
    let mut normalized = Vec::with_capacity(tags.len());
    for tag in tags {
        let trimmed = tag.trim();
        validate_tag(trimmed)?;
        if seen.insert(trimmed.to_string()) {
            normalized.push(trimmed.to_string());
        }
    }
    Ok(normalized)
}

/// Validate and normalize file types under the given limits.
pub fn normalize_file_types(file_types: &[String], limits: &FieldLimits) -> Result<Vec<String>> {
    if file_types.len() > limits.max_file_types {
        return Err(SnipError::validation(
            Field::FileTypes,
            format!(
                "too many file types ({}, max {})",
                file_types.len(),
                limits.max_file_types
            ),
        ));
    }

    let mut normalized: Vec<String> = Vec::with_capacity(file_types.len());
    for file_type in file_types {
        let trimmed = file_type.trim();
        validate_file_type(trimmed)?;
        if !normalized.iter().any(|existing| existing == trimmed) {
            normalized.push(trimmed.to_string());
        }
    }
    Ok(normalized)
}

/// Validate every field of a draft, returning the normalized draft.
pub fn validate_draft(draft: &SnippetDraft, limits: &FieldLimits) -> Result<SnippetDraft> {
    let name = draft.name.trim();
    validate_name(name)?;
    let prefix = draft.prefix.trim();
    validate_prefix(prefix)?;
    let description = match draft.description.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => {
            validate_description(value)?;
            Some(value.to_string())
        }
        _ => None,
    };
    validate_body(&draft.body, limits)?;
    let tags = normalize_tags(&draft.tags)?;
    let file_types = normalize_file_types(&draft.file_types, limits)?;

    Ok(SnippetDraft {
        name: name.to_string(),
        prefix: prefix.to_string(),
        description,
        body: draft.body.clone(),
        tags,
        file_types,
        scope: draft.scope,
        folder_id: draft.folder_id.clone(),
        is_favorite: draft.is_favorite,
    })
}

/// Validate the fields a patch sets, returning the normalized patch.
pub fn validate_patch(patch: &SnippetPatch) -> Result<SnippetPatch> {
    let limits = FieldLimits::CREATE;
    let mut normalized = patch.clone();

    if let Some(name) = patch.name.as_deref() {
        let name = name.trim();
        validate_name(name)?;
        normalized.name = Some(name.to_string());
    }
    if let Some(prefix) = patch.prefix.as_deref() {
        let prefix = prefix.trim();
        validate_prefix(prefix)?;
        normalized.prefix = Some(prefix.to_string());
    }
    if let Some(description) = &patch.description {
        normalized.description = match description.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => {
                validate_description(value)?;
                Some(Some(value.to_string()))
            }
            _ => Some(None),
        };
    }
    if let Some(body) = patch.body.as_deref() {
        validate_body(body, &limits)?;
    }
    if let Some(tags) = patch.tags.as_deref() {
        normalized.tags = Some(normalize_tags(tags)?);
    }
    if let Some(file_types) = patch.file_types.as_deref() {
        normalized.file_types = Some(normalize_file_types(file_types, &limits)?);
    }
    Ok(normalized)
}

fn require_non_empty(field: Field, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SnipError::validation(field, "is required"));
    }
    Ok(())
}

fn check_length(field: Field, value: &str, max: usize) -> Result<()> {
    let count = value.chars().count();
    if count > max {
        return Err(SnipError::validation(
            field,
            format!("is too long ({} characters, max {})", count, max),
        ));
    }
    Ok(())
}

fn reject_markup(field: Field, value: &str) -> Result<()> {
    if MARKUP.is_match(value) {
        return Err(SnipError::validation(field, "must not contain HTML or XML tags"));
    }
    Ok(())
}

fn scan_denylist(field: Field, value: &str) -> Result<()> {
    let lowered = value.to_lowercase();
    if let Some(pattern) = DENYLIST.iter().find(|pattern| lowered.contains(**pattern)) {
        return Err(SnipError::validation(
            field,
            format!("contains forbidden pattern '{}'", pattern),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snippet::Scope;

    fn draft() -> SnippetDraft {
        SnippetDraft::new("Log line", "logl", "console.log($1);")
    }

    fn reason(err: SnipError) -> (Field, String) {
        match err {
            SnipError::Validation { field, reason } => (field, reason),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_draft_is_normalized() {
        let mut input = draft();
        input.name = "  Log line  ".to_string();
        input.tags = vec![" js ".to_string(), "js".to_string(), "debug".to_string()];
        input.file_types = vec!["ts".to_string(), "*".to_string(), "ts".to_string()];
        input.description = Some("   ".to_string());

        let normalized = validate_draft(&input, &FieldLimits::CREATE).unwrap();

        assert_eq!(normalized.name, "Log line");
        assert_eq!(normalized.tags, vec!["js", "debug"]);
        assert_eq!(normalized.file_types, vec!["ts", "*"]);
        assert_eq!(normalized.description, None);
        assert_eq!(normalized.scope, Scope::Global);
    }

    #[test]
    fn test_required_fields() {
        let mut input = draft();
        input.body = "   \n".to_string();
        let (field, _) = reason(validate_draft(&input, &FieldLimits::CREATE).unwrap_err());
        assert_eq!(field, Field::Body);

        let mut input = draft();
        input.prefix = String::new();
        let (field, msg) = reason(validate_draft(&input, &FieldLimits::CREATE).unwrap_err());
        assert_eq!(field, Field::Prefix);
        assert_eq!(msg, "is required");
    }

    #[test]
    fn test_prefix_charset() {
        assert!(validate_prefix("my-snip_2").is_ok());
        let (field, _) = reason(validate_prefix("bad prefix").unwrap_err());
        assert_eq!(field, Field::Prefix);
        assert!(validate_prefix("semi;colon").is_err());
        assert!(validate_prefix(&"p".repeat(MAX_PREFIX_CHARS + 1)).is_err());
    }

    #[test]
    fn test_length_ceilings_count_characters() {
        assert!(validate_name(&"é".repeat(MAX_NAME_CHARS)).is_ok());
        assert!(validate_name(&"é".repeat(MAX_NAME_CHARS + 1)).is_err());
        assert!(validate_description(&"d".repeat(MAX_DESCRIPTION_CHARS + 1)).is_err());
    }

    #[test]
    fn test_body_limit_depends_on_path() {
        let body = "x".repeat(20_000);
        assert!(validate_body(&body, &FieldLimits::CREATE).is_err());
        assert!(validate_body(&body, &FieldLimits::IMPORT).is_ok());
    }

    #[test]
    fn test_markup_rejected_outside_body() {
        let (field, msg) = reason(validate_name("<b>bold</b>").unwrap_err());
        assert_eq!(field, Field::Name);
        assert!(msg.contains("HTML"));
        assert!(validate_tag("<img src=x>").is_err());
        assert!(validate_name("a < b > c").is_ok());
        assert!(validate_body("let v: Vec<String> = vec![];", &FieldLimits::CREATE).is_ok());
    }

    #[test]
    fn test_denylist_names_pattern() {
        let (field, msg) = reason(
            validate_body("window.location = 'JavaScript:alert(1)'", &FieldLimits::CREATE)
                .unwrap_err(),
        );
        assert_eq!(field, Field::Body);
        assert!(msg.contains("javascript:"));

        let (_, msg) = reason(validate_description("see ../../secrets").unwrap_err());
        assert!(msg.contains("../"));

        let (_, msg) = reason(validate_name("img onerror=steal()").unwrap_err());
        assert!(msg.contains("onerror="));
    }

    #[test]
    fn test_tag_cardinality() {
        let tags: Vec<String> = (0..=MAX_TAGS).map(|i| format!("t{i}")).collect();
        let (field, _) = reason(normalize_tags(&tags).unwrap_err());
        assert_eq!(field, Field::Tags);
    }

    #[test]
    fn test_file_type_rules() {
        assert!(validate_file_type("*").is_ok());
        assert!(validate_file_type("d.ts").is_ok());
        assert!(validate_file_type("c++").is_err());
        let many: Vec<String> = (0..15).map(|i| format!("ft{i}")).collect();
        assert!(normalize_file_types(&many, &FieldLimits::CREATE).is_err());
        assert!(normalize_file_types(&many, &FieldLimits::IMPORT).is_ok());
    }

    #[test]
    fn test_patch_only_checks_set_fields() {
        let patch = SnippetPatch {
            is_favorite: Some(true),
            ..SnippetPatch::default()
        };
        assert!(validate_patch(&patch).is_ok());

        let patch = SnippetPatch {
            body: Some("vbscript:msgbox".to_string()),
            ..SnippetPatch::default()
        };
        assert!(validate_patch(&patch).is_err());

        let patch = SnippetPatch {
            description: Some(Some("  ".to_string())),
            ..SnippetPatch::default()
        };
        assert_eq!(validate_patch(&patch).unwrap().description, Some(None));
    }
}
