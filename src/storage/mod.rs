//! Record storage for simlineage.
//!
//! The lineage core talks to its backend only through [`RecordStore`].
//! Two implementations ship with the crate: an in-memory store for embedded
//! use and tests, and (with the `persistent` feature) a durable log-backed
//! store.

mod memory;
mod predicate;
mod traits;

#[cfg(feature = "persistent")]
pub mod persistent;

pub use memory::InMemoryRecordStore;
pub use predicate::{Field, Order, Predicate};
pub use traits::{RecordStore, StorageError};

#[cfg(feature = "persistent")]
pub use persistent::{open_store, PersistentConfig, PersistentRecordStore};
