//! Error types for SnipVault core operations.
//!
//! This module defines the error hierarchy for all core operations.
//! Errors are descriptive at the core level; the CLI layer maps these
//! to user-facing messages and exit codes.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for SnipVault operations.
pub type Result<T> = std::result::Result<T, SnipError>;

/// Snippet fields checked by the sanitizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Prefix,
    Description,
    Body,
    Tags,
    Tag,
    FileTypes,
    FileType,
    Scope,
    Pin,
    EmergencyCode,
    Record,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Prefix => "prefix",
            Field::Description => "description",
            Field::Body => "body",
            Field::Tags => "tags",
            Field::Tag => "tag",
            Field::FileTypes => "fileTypes",
            Field::FileType => "fileType",
            Field::Scope => "scope",
            Field::Pin => "pin",
            Field::EmergencyCode => "emergencyCode",
            Field::Record => "record",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a bulk import was rejected as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportRejection {
    /// Source text exceeds the byte ceiling.
    TooLarge { bytes: usize, max: usize },

    /// Source text carries an object-prototype-pollution marker.
    PollutionMarker(&'static str),

    /// Source is not valid JSON.
    Malformed(String),

    /// Top-level value is not an array.
    NotAnArray,

    /// Array has more elements than allowed.
    TooManyRecords { count: usize, max: usize },

    /// Every element failed validation.
    NoValidRecords { skipped: usize },
}

impl fmt::Display for ImportRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportRejection::TooLarge { bytes, max } => {
                write!(f, "source is {} bytes (max {})", bytes, max)
            }
            ImportRejection::PollutionMarker(marker) => {
                write!(f, "source contains forbidden key '{}'", marker)
            }
            ImportRejection::Malformed(reason) => write!(f, "invalid JSON: {}", reason),
            ImportRejection::NotAnArray => f.write_str("top-level value must be an array"),
            ImportRejection::TooManyRecords { count, max } => {
                write!(f, "{} records (max {})", count, max)
            }
            ImportRejection::NoValidRecords { skipped } => {
                write!(f, "no valid records ({} skipped)", skipped)
            }
        }
    }
}

/// Core error type for SnipVault operations.
#[derive(Debug, Error)]
pub enum SnipError {
    /// A field failed sanitizer rules
    #[error("Validation error: {field}: {reason}")]
    Validation { field: Field, reason: String },

    /// Referenced snippet does not exist
    #[error("Snippet not found: {0}")]
    NotFound(String),

    /// Per-operation call budget for the current window is spent
    #[error("Rate limit exceeded for {operation}; retry in {}s", retry_after.as_secs().max(1))]
    RateLimitExceeded {
        operation: String,
        retry_after: Duration,
    },

    /// Storage backend error (read, write, directory creation)
    #[error("Storage error: {0}")]
    Storage(String),

    /// PIN gate denied access
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// PIN gate is locked after too many failed attempts
    #[error("Locked out after too many failed PIN attempts; try again in {remaining_minutes} minute(s)")]
    LockedOut { remaining_minutes: i64 },

    /// Batch-level import failure; nothing was changed
    #[error("Import rejected: {0}")]
    ImportRejected(ImportRejection),

    /// Secret vault backend failure
    #[error("Vault error: {0}")]
    Vault(String),

    /// User interaction surface failure
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SnipError {
    pub fn validation(field: Field, reason: impl Into<String>) -> Self {
        SnipError::Validation {
            field,
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for SnipError {
    fn from(err: std::io::Error) -> Self {
        SnipError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for SnipError {
    fn from(err: serde_json::Error) -> Self {
        SnipError::Storage(format!("Snapshot serialization failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_field() {
        let err = SnipError::validation(Field::Prefix, "contains invalid characters");
        assert_eq!(
            err.to_string(),
            "Validation error: prefix: contains invalid characters"
        );
    }

    #[test]
    fn test_rate_limit_message_rounds_up_to_one_second() {
        let err = SnipError::RateLimitExceeded {
            operation: "create".to_string(),
            retry_after: Duration::from_millis(200),
        };
        assert!(err.to_string().contains("retry in 1s"));
    }

    #[test]
    fn test_import_rejection_display() {
        let err = SnipError::ImportRejected(ImportRejection::NoValidRecords { skipped: 3 });
        assert_eq!(err.to_string(), "Import rejected: no valid records (3 skipped)");
    }
}
