//! Lineage service facade.
//!
//! Bundles one record store with a resolver and a branch creator sharing a
//! single configuration. This is the entry point UI handlers and automation
//! hold on to.

use std::sync::Arc;

use tracing::info;

use crate::error::LineageResult;
use crate::lineage::{BranchCreator, BranchRequest, Lineage, LineageConfig, LineageReport, LineageResolver};
use crate::storage::RecordStore;
use crate::version::{NewVersion, Payload, SimulationId, SimulationStatus, SimulationVersion};

/// Resolve and branch simulation lineages over one record store.
#[derive(Debug, Clone)]
pub struct LineageService {
    resolver: LineageResolver,
    creator: BranchCreator,
}

impl LineageService {
    /// Create a service over `store`.
    ///
    /// # Errors
    /// `Validation` if `config` is invalid.
    pub fn new(store: Arc<dyn RecordStore>, config: LineageConfig) -> LineageResult<Self> {
        let creator = BranchCreator::new(Arc::clone(&store), config)?;
        Ok(Self {
            resolver: LineageResolver::new(store),
            creator,
        })
    }

    /// Create a service with the default configuration.
    ///
    /// # Errors
    /// As [`Self::new`].
    pub fn with_defaults(store: Arc<dyn RecordStore>) -> LineageResult<Self> {
        Self::new(store, LineageConfig::default())
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &LineageConfig {
        self.creator.config()
    }

    /// Creates the root version of a new lineage.
    ///
    /// Ordinary simulation creation; branching never goes through here.
    ///
    /// # Errors
    /// `Store` if the record store rejects the record.
    pub fn create_root(
        &self,
        status: SimulationStatus,
        payload: Payload,
        label: Option<&str>,
    ) -> LineageResult<SimulationVersion> {
        let record = NewVersion::root(status, payload).with_label(label);
        record.validate(self.config().max_label_len)?;
        let created = self.resolver.store().create(record)?;
        info!(id = %created.id, "lineage root created");
        Ok(created)
    }

    /// Fetches a single version.
    ///
    /// # Errors
    /// `NotFound` if the id is not stored.
    pub fn get(&self, simulation_id: &SimulationId) -> LineageResult<SimulationVersion> {
        self.resolver.get(simulation_id)
    }

    /// All versions of `simulation_id`'s lineage, newest first.
    ///
    /// # Errors
    /// `NotFound` if the id is not stored; `Store` on backend failure.
    pub fn resolve_lineage(&self, simulation_id: &SimulationId) -> LineageResult<Lineage> {
        self.resolver.resolve_lineage(simulation_id)
    }

    /// Creates the next version of `base`'s lineage.
    ///
    /// # Errors
    /// See [`BranchCreator::create_branch`].
    pub fn create_branch(
        &self,
        base: &SimulationVersion,
        request: BranchRequest,
    ) -> LineageResult<SimulationVersion> {
        self.creator.create_branch(base, request)
    }

    /// Loads `base_id` and branches from it.
    ///
    /// # Errors
    /// `NotFound` if `base_id` is not stored, otherwise as [`Self::create_branch`].
    pub fn create_branch_from(
        &self,
        base_id: &SimulationId,
        request: BranchRequest,
    ) -> LineageResult<SimulationVersion> {
        let base = self.resolver.get(base_id)?;
        self.creator.create_branch(&base, request)
    }

    /// Integrity audit of `simulation_id`'s lineage.
    ///
    /// # Errors
    /// As [`Self::resolve_lineage`].
    pub fn audit(&self, simulation_id: &SimulationId) -> LineageResult<LineageReport> {
        Ok(self.resolver.resolve_lineage(simulation_id)?.check())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::storage::InMemoryRecordStore;

    fn service() -> LineageService {
        LineageService::with_defaults(Arc::new(InMemoryRecordStore::new())).unwrap()
    }

    #[test]
    fn create_root_then_branch_by_id() {
        let svc = service();
        let mut payload = Payload::new();
        payload.insert("scenario".to_string(), json!("Recall a product"));
        let root = svc.create_root(SimulationStatus::InProgress, payload, Some("baseline")).unwrap();
        assert!(root.is_root());
        assert_eq!(root.version_number, 1);
        assert_eq!(root.version_label.as_deref(), Some("baseline"));

        let b1 = svc.create_branch_from(&root.id, BranchRequest::labeled("pr-first")).unwrap();
        assert_eq!(b1.version_number, 2);
        assert_eq!(svc.get(&b1.id).unwrap(), b1);

        let lineage = svc.resolve_lineage(&root.id).unwrap();
        assert_eq!(lineage.len(), 2);
        assert!(svc.audit(&b1.id).unwrap().is_consistent());
    }

    #[test]
    fn branch_from_unknown_id_is_not_found() {
        let svc = service();
        let err = svc
            .create_branch_from(&SimulationId::new("unknown-id"), BranchRequest::new())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn create_root_validates_label() {
        let svc = service();
        let label = "y".repeat(svc.config().max_label_len + 1);
        let err = svc
            .create_root(SimulationStatus::Draft, Payload::new(), Some(&label))
            .unwrap_err();
        assert!(err.is_validation());
    }
}
