//! Lineage layer: resolving and extending version lineages.
//!
//! A lineage is a flat star: one root version and every branch of it, each
//! branch pointing straight at the root. "Parent" means lineage root, never
//! the immediate predecessor, so a lineage is always one equality query.

pub mod branch;
pub mod config;
pub mod ordering;
pub mod resolver;

pub use branch::{BranchCreator, BranchRequest};
pub use config::{ConflictPolicy, LineageConfig};
pub use ordering::LineageReport;
pub use resolver::{Lineage, LineageResolver, VersionSummary};
