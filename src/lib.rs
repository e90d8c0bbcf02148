//! # simlineage - Version branching for decision simulations
//!
//! Simulations are mutable documents that users branch into new versions.
//! simlineage keeps those versions in an append-only lineage over any record
//! store that can create records and filter them by field equality.
//!
//! ## Core Concepts
//!
//! - **SimulationVersion**: one stored version; its payload is opaque
//! - **Lineage**: a root version plus every branch of it, as a flat star
//! - **LineageResolver**: any version id → the whole lineage, newest first
//! - **BranchCreator**: a version → the next version of its lineage
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use simlineage::{BranchRequest, InMemoryRecordStore, LineageService, Payload, SimulationStatus};
//!
//! let service = LineageService::with_defaults(Arc::new(InMemoryRecordStore::new()))?;
//! let root = service.create_root(SimulationStatus::Completed, Payload::new(), None)?;
//!
//! let branch = service.create_branch(&root, BranchRequest::labeled("alt-approach"))?;
//! assert_eq!(branch.version_number, 2);
//! assert_eq!(branch.parent_simulation_id.as_ref(), Some(&root.id));
//!
//! let lineage = service.resolve_lineage(&root.id)?;
//! assert_eq!(lineage.versions()[0].id, branch.id);
//! # Ok::<(), simlineage::LineageError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod lineage;
pub mod service;
pub mod storage;
pub mod version;

// Re-export primary types at crate root for convenience
pub use error::{LineageError, LineageResult, ValidationError};
pub use lineage::{
    BranchCreator, BranchRequest, ConflictPolicy, Lineage, LineageConfig, LineageReport,
    LineageResolver, VersionSummary,
};
pub use service::LineageService;
pub use storage::{Field, InMemoryRecordStore, Order, Predicate, RecordStore, StorageError};
pub use version::{NewVersion, Payload, SimulationId, SimulationStatus, SimulationVersion};
