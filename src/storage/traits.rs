//! Abstract record-store trait for simlineage.
//!
//! The lineage core needs exactly two things from its backend: create a
//! record and filter records by field equality. Everything else here is an
//! optional capability with a conservative default, so any document store
//! can be adapted without promising guarantees it does not have.

use thiserror::Error;

use crate::storage::predicate::{Field, Order, Predicate};
use crate::version::{NewVersion, SimulationId, SimulationVersion};

/// Errors that can occur during record-store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Record not found.
    #[error("Record not found: {0}")]
    NotFound(SimulationId),

    /// A record with this id already exists.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// A conditional create found the version number already taken.
    #[error("Version {version_number} already exists in lineage {root_id} (record {existing})")]
    DuplicateVersion {
        /// Lineage the create targeted.
        root_id: SimulationId,
        /// The contested version number.
        version_number: u32,
        /// Record already holding that number.
        existing: SimulationId,
    },

    /// The backend does not offer this capability.
    #[error("Operation not supported by this store: {0}")]
    Unsupported(String),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Connection failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The backend did not answer in time.
    #[error("Store timed out: {0}")]
    Timeout(String),

    /// Local I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Returns true if the same call may succeed when retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}

/// Storage trait for simulation version records.
///
/// # Consistency
/// - Only single-record atomicity is assumed
/// - `create` enforces no uniqueness beyond the generated id
/// - Implementations must be safe to share across threads
pub trait RecordStore: Send + Sync {
    /// Persist a new record, assigning its `id` and `created_at`.
    fn create(&self, record: NewVersion) -> Result<SimulationVersion, StorageError>;

    /// Return every record matching `predicate`, sorted by `order` when given.
    fn filter(
        &self,
        predicate: &Predicate,
        order: Option<Order>,
    ) -> Result<Vec<SimulationVersion>, StorageError>;

    /// Fetch a record by id.
    fn get(&self, id: &SimulationId) -> Result<Option<SimulationVersion>, StorageError> {
        let matches = self.filter(&Predicate::eq(Field::Id, id.as_str()), None)?;
        Ok(matches.into_iter().next())
    }

    /// Whether [`RecordStore::create_unique`] is implemented.
    fn supports_conditional_create(&self) -> bool {
        false
    }

    /// Persist a record only if its lineage does not yet hold its version number.
    ///
    /// The check and the write must be one atomic step.
    ///
    /// # Errors
    /// - `DuplicateVersion`: the number is already taken in the lineage
    /// - `Unsupported`: the store has no conditional writes (the default)
    fn create_unique(&self, record: NewVersion) -> Result<SimulationVersion, StorageError> {
        let _ = record;
        Err(StorageError::Unsupported("conditional create".to_string()))
    }
}
