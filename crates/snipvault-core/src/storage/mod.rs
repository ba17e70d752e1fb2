//! Storage abstractions and the snapshot backend.

mod import;
pub mod snapshot;
pub mod traits;

pub use import::{MAX_IMPORT_BYTES, MAX_IMPORT_RECORDS};
pub use snapshot::{LoadSource, SnapshotPaths, SnapshotStore, BACKUP_FILE, SNAPSHOT_FILE};
pub use traits::{operations, SnippetRepository};
