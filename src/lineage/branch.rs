//! Branch creation.
//!
//! A branch copies the base version's payload into a new record attached to
//! the lineage *root* with the next free version number. The maximum is
//! re-read from the store at branch time rather than taken from the caller's
//! copy of the base, which narrows (but on stores without conditional writes
//! cannot close) the window in which two writers pick the same number.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::{LineageError, LineageResult, ValidationError};
use crate::lineage::config::{ConflictPolicy, LineageConfig};
use crate::lineage::ordering;
use crate::lineage::resolver::LineageResolver;
use crate::storage::{RecordStore, StorageError};
use crate::version::{normalize_label, NewVersion, SimulationId, SimulationStatus, SimulationVersion};

/// Options for a single branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchRequest {
    /// Optional annotation for the new version.
    pub label: Option<String>,
    /// Status override; the configured branch status when absent.
    pub status: Option<SimulationStatus>,
    /// Keep the configured analysis keys in the copied payload.
    pub carry_over_analysis: bool,
}

impl BranchRequest {
    /// A request with no label.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A request with the given label.
    #[must_use]
    pub fn labeled(label: impl Into<String>) -> Self {
        Self::new().label(label)
    }

    /// Sets the label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the status the branch starts in.
    #[must_use]
    pub fn status(mut self, status: SimulationStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Copies prior analysis results into the branch.
    #[must_use]
    pub fn carry_over_analysis(mut self, carry: bool) -> Self {
        self.carry_over_analysis = carry;
        self
    }
}

/// Creates new versions inside existing lineages.
#[derive(Debug, Clone)]
pub struct BranchCreator {
    resolver: LineageResolver,
    config: LineageConfig,
}

impl BranchCreator {
    /// Create a branch creator over `store`.
    ///
    /// # Errors
    /// `Validation` if `config` is invalid.
    pub fn new(store: Arc<dyn RecordStore>, config: LineageConfig) -> LineageResult<Self> {
        Ok(Self {
            resolver: LineageResolver::new(store),
            config: config.validate()?,
        })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &LineageConfig {
        &self.config
    }

    /// Creates the next version of `base`'s lineage.
    ///
    /// `base` may be any member of the lineage; the new version always points
    /// at the root and receives the current maximum version number plus one.
    ///
    /// # Errors
    /// - `NotFound` if `base` is no longer stored
    /// - `Conflict` if another writer holds the same version number
    /// - `Validation` for a bad label or an inconsistent `base`
    /// - `Store` for record-store failures
    #[instrument(skip_all, fields(base_id = %base.id, root_id = %base.root_id()))]
    pub fn create_branch(
        &self,
        base: &SimulationVersion,
        request: BranchRequest,
    ) -> LineageResult<SimulationVersion> {
        if base.parent_simulation_id.as_ref() == Some(&base.id) {
            return Err(ValidationError::SelfParent { id: base.id.clone() }.into());
        }
        let root_id = base.root_id().clone();

        match self.config.conflict_policy {
            ConflictPolicy::Ignore => {
                let record = self.prepare(base, &root_id, &request)?;
                self.persist(record)
            }
            ConflictPolicy::Detect => {
                let record = self.prepare(base, &root_id, &request)?;
                let created = self.persist(record)?;
                self.detect_conflict(&root_id, created)
            }
            ConflictPolicy::Conditional => self.create_conditional(base, &root_id, &request),
        }
    }

    /// Re-reads the lineage and builds the record for the next version.
    fn prepare(
        &self,
        base: &SimulationVersion,
        root_id: &SimulationId,
        request: &BranchRequest,
    ) -> LineageResult<NewVersion> {
        let lineage = self.resolver.resolve_lineage(&base.id)?;
        if lineage.root_id() != root_id {
            return Err(ValidationError::RootMismatch {
                id: base.id.clone(),
                claimed: root_id.clone(),
                stored: lineage.root_id().clone(),
            }
            .into());
        }

        let version_number = ordering::next_version_number(root_id, lineage.versions())?;
        Ok(self.build_record(base, root_id, version_number, request)?)
    }

    fn build_record(
        &self,
        base: &SimulationVersion,
        root_id: &SimulationId,
        version_number: u32,
        request: &BranchRequest,
    ) -> Result<NewVersion, ValidationError> {
        let mut payload = base.payload.clone();
        if !request.carry_over_analysis {
            for key in &self.config.analysis_keys {
                payload.remove(key);
            }
        }

        let record = NewVersion {
            parent_simulation_id: Some(root_id.clone()),
            version_number,
            version_label: normalize_label(request.label.clone()),
            status: request
                .status
                .clone()
                .unwrap_or_else(|| self.config.branch_status.clone()),
            payload,
        };
        record.validate(self.config.max_label_len)?;
        Ok(record)
    }

    fn persist(&self, record: NewVersion) -> LineageResult<SimulationVersion> {
        let created = self.resolver.store().create(record).map_err(map_create_error)?;
        info!(
            id = %created.id,
            version_number = created.version_number,
            "branch created"
        );
        Ok(created)
    }

    /// First-write-wins arbitration after an unconditional create.
    fn detect_conflict(
        &self,
        root_id: &SimulationId,
        created: SimulationVersion,
    ) -> LineageResult<SimulationVersion> {
        let lineage = self.resolver.resolve_lineage(&created.id)?;
        let Some(owner) = ordering::first_writer(lineage.versions(), created.version_number) else {
            return Err(LineageError::internal(format!(
                "created version {} is missing from its lineage",
                created.id
            )));
        };

        if owner.id == created.id {
            if lineage.find_by_number(created.version_number).count() > 1 {
                debug!(
                    version_number = created.version_number,
                    "concurrent branch lost the version number to this one"
                );
            }
            return Ok(created);
        }

        warn!(
            version_number = created.version_number,
            winner = %owner.id,
            loser = %created.id,
            "duplicate version number detected after branch"
        );
        Err(LineageError::Conflict {
            root_id: root_id.clone(),
            version_number: created.version_number,
            conflicting_id: owner.id.clone(),
            created: Some(created.id),
        })
    }

    fn create_conditional(
        &self,
        base: &SimulationVersion,
        root_id: &SimulationId,
        request: &BranchRequest,
    ) -> LineageResult<SimulationVersion> {
        let store = self.resolver.store();
        if !store.supports_conditional_create() {
            return Err(StorageError::Unsupported(
                "conditional create (required by ConflictPolicy::Conditional)".to_string(),
            )
            .into());
        }

        let mut last_clash = None;
        for attempt in 1..=self.config.max_branch_attempts {
            let record = self.prepare(base, root_id, request)?;
            let version_number = record.version_number;

            match store.create_unique(record) {
                Ok(created) => {
                    info!(
                        id = %created.id,
                        version_number = created.version_number,
                        attempt,
                        "branch created"
                    );
                    return Ok(created);
                }
                Err(StorageError::DuplicateVersion { existing, .. }) => {
                    debug!(version_number, attempt, existing = %existing, "version number taken; retrying");
                    last_clash = Some((version_number, existing));
                }
                Err(e) => return Err(map_create_error(e)),
            }
        }

        let (version_number, conflicting_id) = last_clash.ok_or_else(|| {
            LineageError::internal("conditional branch loop ended without an attempt")
        })?;
        warn!(
            version_number,
            attempts = self.config.max_branch_attempts,
            "giving up on branch after repeated version collisions"
        );
        Err(LineageError::Conflict {
            root_id: root_id.clone(),
            version_number,
            conflicting_id,
            created: None,
        })
    }
}

/// A store rejecting the implied reference to a vanished base surfaces as `NotFound`.
fn map_create_error(err: StorageError) -> LineageError {
    match err {
        StorageError::NotFound(id) => LineageError::NotFound { id },
        other => other.into(),
    }
}
