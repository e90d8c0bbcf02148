//! Lineage configuration.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::version::SimulationStatus;

/// What a branch does when another writer took the same version number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Re-read the lineage after creating; the earliest-created record keeps
    /// the number and later writers get [`crate::LineageError::Conflict`].
    #[default]
    Detect,
    /// Accept duplicate numbers silently.
    Ignore,
    /// Assign numbers with the store's atomic conditional create, retrying on
    /// collisions. Requires [`crate::RecordStore::supports_conditional_create`].
    Conditional,
}

/// Configuration for resolving and branching lineages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineageConfig {
    /// How duplicate version numbers are handled.
    pub conflict_policy: ConflictPolicy,
    /// Attempts per branch under [`ConflictPolicy::Conditional`].
    pub max_branch_attempts: u32,
    /// Longest accepted version label, in characters.
    pub max_label_len: usize,
    /// Status every new branch starts in unless the request overrides it.
    pub branch_status: SimulationStatus,
    /// Payload keys holding prior analysis results; dropped on branch unless
    /// the request carries them over.
    pub analysis_keys: Vec<String>,
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            conflict_policy: ConflictPolicy::Detect,
            max_branch_attempts: 3,
            max_label_len: 200,
            branch_status: SimulationStatus::Draft,
            analysis_keys: vec!["analysis_results".to_string()],
        }
    }
}

impl LineageConfig {
    /// Checks the configuration.
    ///
    /// # Errors
    /// `InvalidConfig` naming the offending setting.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.max_branch_attempts == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "max_branch_attempts must be at least 1".to_string(),
            });
        }

        if self.max_label_len == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "max_label_len must be at least 1".to_string(),
            });
        }

        self.branch_status.validate()?;

        if self.analysis_keys.iter().any(|k| k.trim().is_empty()) {
            return Err(ValidationError::InvalidConfig {
                reason: "analysis_keys cannot contain empty keys".to_string(),
            });
        }

        Ok(self)
    }

    /// Same configuration with a different conflict policy.
    #[must_use]
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }
}
