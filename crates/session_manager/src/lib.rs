//! # Session Manager
//!
//! Persists archived conversations and the settings snapshot.
//! Anonymous sessions are kept in a local JSON file; signed-in users are
//! stored in a remote object store keyed by their storage key.

pub mod error;
pub mod remote;
pub mod service;
pub mod settings;
pub mod storage;

// Re-exports
pub use error::{Result, StorageError};
pub use remote::RemoteArchiveStorage;
pub use service::{ArchiveService, LOCAL_ARCHIVE_KEY};
pub use settings::SettingsStore;
pub use storage::{ArchiveStorage, FileArchiveStorage};
