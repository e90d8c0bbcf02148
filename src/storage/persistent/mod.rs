//! Persistent record store for simlineage.
//!
//! This module provides a durable, single-process backend with:
//! - An append-only record log (versions are never rewritten or deleted)
//! - CRC32-framed entries and torn-tail recovery on open
//! - An exclusive directory lock
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │            PersistentRecordStore              │
//! ├───────────────────────────────────────────────┤
//! │  ┌──────────────┐      ┌──────────────────┐   │
//! │  │  RecordLog   │ ───→ │   RecordIndex    │   │
//! │  │ (append-only)│replay│ (by id, by root) │   │
//! │  └──────┬───────┘      └──────────────────┘   │
//! │         ↓                                     │
//! │  ┌──────────────┐                             │
//! │  │   DirLock    │                             │
//! │  └──────────────┘                             │
//! └───────────────────────────────────────────────┘
//! ```

mod codec;
mod file_lock;
mod store;
mod wal;

pub use file_lock::{DirLock, LOCK_FILE_NAME};
pub use store::{PersistentRecordStore, LOG_FILE_NAME};
pub use wal::{LogEntry, LogSink, RecordLog, Replay};

use std::path::Path;

use crate::storage::traits::StorageError;

/// Configuration for the persistent store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistentConfig {
    /// Whether to fsync after every append (slower but survives power loss).
    pub sync_on_write: bool,
}

impl Default for PersistentConfig {
    fn default() -> Self {
        Self { sync_on_write: true }
    }
}

/// Open or create a persistent record store at the given directory.
///
/// # Errors
/// - If the directory cannot be created or accessed
/// - If another owner holds the directory lock
/// - If the log is not a simlineage log or holds duplicate ids
///
/// # Example
/// ```rust,ignore
/// use std::sync::Arc;
/// use simlineage::{LineageConfig, LineageService};
/// use simlineage::storage::persistent::open_store;
///
/// let store = open_store("./simulations", None)?;
/// let service = LineageService::new(Arc::new(store), LineageConfig::default())?;
/// ```
pub fn open_store(
    dir: impl AsRef<Path>,
    config: Option<PersistentConfig>,
) -> Result<PersistentRecordStore, StorageError> {
    PersistentRecordStore::open(dir.as_ref(), config.unwrap_or_default())
}
