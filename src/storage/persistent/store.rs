//! Durable record store.
//!
//! Wraps the shared in-memory index with the append-only record log: a
//! record is appended (and optionally fsynced) before it becomes visible to
//! readers, so anything a reader has seen survives a restart.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use tracing::{debug, info};

use crate::storage::memory::RecordIndex;
use crate::storage::predicate::{Order, Predicate};
use crate::storage::traits::{RecordStore, StorageError};
use crate::version::{NewVersion, SimulationId, SimulationVersion};

use super::file_lock::DirLock;
use super::wal::RecordLog;
use super::PersistentConfig;

/// File name of the record log inside the store directory.
pub const LOG_FILE_NAME: &str = "records.log";

fn lock_err(context: &'static str) -> StorageError {
    StorageError::Backend(format!("poisoned lock: {context}"))
}

/// Record store persisted to a directory.
#[derive(Debug)]
pub struct PersistentRecordStore {
    dir: PathBuf,
    _lock: DirLock,
    log: Mutex<RecordLog>,
    index: RwLock<RecordIndex>,
    config: PersistentConfig,
}

impl PersistentRecordStore {
    /// Open or create a store in `dir`.
    ///
    /// # Errors
    /// - `Io` if the directory cannot be created or is locked by another owner
    /// - `Io` if the log header is not a simlineage log
    /// - `Backend` if the log holds two records with one id
    pub fn open(dir: &Path, config: PersistentConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(dir)?;
        let lock = DirLock::acquire(dir)?;

        let (log, replay) = RecordLog::open(&dir.join(LOG_FILE_NAME), config.sync_on_write)?;
        let mut index = RecordIndex::default();
        for entry in replay.entries {
            index.insert(entry.record).map_err(|e| {
                StorageError::Backend(format!(
                    "record log replay failed at sequence {}: {e}",
                    entry.sequence
                ))
            })?;
        }

        info!(
            dir = %dir.display(),
            records = index.len(),
            discarded_bytes = replay.discarded_bytes,
            "opened persistent record store"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            _lock: lock,
            log: Mutex::new(log),
            index: RwLock::new(index),
            config,
        })
    }

    /// Directory backing this store.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Configuration the store was opened with.
    #[must_use]
    pub fn config(&self) -> &PersistentConfig {
        &self.config
    }

    /// Number of stored records.
    pub fn len(&self) -> Result<usize, StorageError> {
        let index = self.index.read().map_err(|_| lock_err("persistent.len"))?;
        Ok(index.len())
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    /// Import a fully materialized record as-is.
    ///
    /// # Errors
    /// `DuplicateKey` if the id is already stored.
    pub fn insert(&self, record: SimulationVersion) -> Result<(), StorageError> {
        let mut index = self.index.write().map_err(|_| lock_err("persistent.insert"))?;
        if index.contains(&record.id) {
            return Err(StorageError::DuplicateKey(record.id.to_string()));
        }
        self.append(&record)?;
        index.insert(record)
    }

    fn append(&self, record: &SimulationVersion) -> Result<(), StorageError> {
        let mut log = self.log.lock().map_err(|_| lock_err("persistent.log"))?;
        let sequence = log.append(record)?;
        debug!(id = %record.id, sequence, "record appended");
        Ok(())
    }

    fn persist_new(
        &self,
        index: &mut RecordIndex,
        record: NewVersion,
    ) -> Result<SimulationVersion, StorageError> {
        let created = record.into_version(index.next_id(), index.next_created_at());
        self.append(&created)?;
        index.insert(created.clone())?;
        Ok(created)
    }
}

impl RecordStore for PersistentRecordStore {
    fn create(&self, record: NewVersion) -> Result<SimulationVersion, StorageError> {
        let mut index = self.index.write().map_err(|_| lock_err("persistent.create"))?;
        self.persist_new(&mut index, record)
    }

    fn filter(
        &self,
        predicate: &Predicate,
        order: Option<Order>,
    ) -> Result<Vec<SimulationVersion>, StorageError> {
        let index = self.index.read().map_err(|_| lock_err("persistent.filter"))?;
        Ok(index.filter(predicate, order))
    }

    fn get(&self, id: &SimulationId) -> Result<Option<SimulationVersion>, StorageError> {
        let index = self.index.read().map_err(|_| lock_err("persistent.get"))?;
        Ok(index.get(id).cloned())
    }

    fn supports_conditional_create(&self) -> bool {
        true
    }

    fn create_unique(&self, record: NewVersion) -> Result<SimulationVersion, StorageError> {
        let mut index = self.index.write().map_err(|_| lock_err("persistent.create_unique"))?;
        if let Some(root) = record.root_id() {
            if let Some(existing) = index.find_version_number(root, record.version_number) {
                return Err(StorageError::DuplicateVersion {
                    root_id: root.clone(),
                    version_number: record.version_number,
                    existing: existing.id.clone(),
                });
            }
        }
        self.persist_new(&mut index, record)
    }
}
