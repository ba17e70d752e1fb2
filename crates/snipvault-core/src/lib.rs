//! # SnipVault Core
//!
//! Core library for SnipVault - a local, PIN-protected store for reusable
//! code snippets.
//!
//! This crate provides storage, access control and input sanitization
//! independent of any front end.
//!
//! ## Architecture
//!
//! - **storage**: Repository trait and the JSON snapshot backend
//! - **access**: PIN session gate, secret vault and interaction seams
//! - **sanitize**: Field validation shared by create, update and import
//! - **rate_limit**: Per-operation fixed-window call limits
//! - **manager**: Access-checked entry point over a store
//! - **clock**: Injectable time source

pub mod access;
pub mod clock;
pub mod error;
pub mod fs;
pub mod manager;
pub mod rate_limit;
pub mod sanitize;
pub mod snippet;
pub mod storage;

pub use access::{AccessDecision, AccessGate, GateConfig, GateState, MemoryVault, SecretVault};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Field, ImportRejection, Result, SnipError};
pub use manager::{FolderCounts, PinStatus, SnippetManager};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use snippet::{
    ImportDiagnostic, ImportReport, Scope, SearchFilter, Snippet, SnippetDraft, SnippetPatch,
    StoreStats,
};
pub use storage::{SnapshotStore, SnippetRepository};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
