//! Error types for simlineage.
//!
//! Errors are layered the same way the crate is: record validation,
//! record-store failures, and the lineage operations built on top of both.
//! Every layer is a thiserror enum so callers can match on precise kinds.

use thiserror::Error;

use crate::storage::StorageError;
use crate::version::SimulationId;

/// Validation errors raised before anything reaches the record store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Version number must be at least 1 (got {value})")]
    InvalidVersionNumber {
        value: u32,
    },

    #[error("Root versions must carry version number 1 (got {value})")]
    RootVersionNumber {
        value: u32,
    },

    #[error("Version label is {len} characters, maximum is {max_len}")]
    LabelTooLong {
        len: usize,
        max_len: usize,
    },

    #[error("Identifier field '{field}' cannot be empty")]
    EmptyIdentifier {
        field: &'static str,
    },

    #[error("Simulation {id} names itself as its lineage root")]
    SelfParent {
        id: SimulationId,
    },

    #[error("Lineage {root_id} has no version numbers left")]
    VersionNumberExhausted {
        root_id: SimulationId,
    },

    #[error("Version {id} claims lineage {claimed} but is stored in lineage {stored}")]
    RootMismatch {
        id: SimulationId,
        claimed: SimulationId,
        stored: SimulationId,
    },

    #[error("Invalid status: {reason}")]
    InvalidStatus {
        reason: String,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Top-level error type for lineage operations.
#[derive(Debug, Error)]
pub enum LineageError {
    /// The referenced simulation id does not resolve to a stored record.
    #[error("Simulation not found: {id}")]
    NotFound {
        id: SimulationId,
    },

    /// Two versions of one lineage share a version number.
    ///
    /// `created` is the record this call persisted (if any); the caller may
    /// re-resolve the lineage and retry the branch.
    #[error(
        "Version number {version_number} is already taken in lineage {root_id} (conflicting version: {conflicting_id})"
    )]
    Conflict {
        root_id: SimulationId,
        version_number: u32,
        conflicting_id: SimulationId,
        created: Option<SimulationId>,
    },

    #[error("Store error: {0}")]
    Store(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl LineageError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a not-found error for the given id.
    #[must_use]
    pub fn not_found(id: &SimulationId) -> Self {
        Self::NotFound { id: id.clone() }
    }

    /// Returns true if this is a not-found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if this is a version-number conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns true if this is a record-store error.
    #[must_use]
    pub const fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if re-resolving and retrying the call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Conflict { .. } => true,
            Self::Store(e) => e.is_transient(),
            Self::NotFound { .. } | Self::Validation(_) | Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for lineage operations.
pub type LineageResult<T> = Result<T, LineageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_label_too_long() {
        let err = ValidationError::LabelTooLong { len: 300, max_len: 200 };
        let msg = err.to_string();
        assert!(msg.contains("300"));
        assert!(msg.contains("200"));
    }

    #[test]
    fn test_not_found_display() {
        let err = LineageError::not_found(&SimulationId::new("unknown-id"));
        assert!(err.is_not_found());
        assert!(err.to_string().contains("unknown-id"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_conflict_is_retryable() {
        let err = LineageError::Conflict {
            root_id: SimulationId::new("r1"),
            version_number: 2,
            conflicting_id: SimulationId::new("b1"),
            created: Some(SimulationId::new("b2")),
        };
        assert!(err.is_conflict());
        assert!(err.is_retryable());
        let msg = err.to_string();
        assert!(msg.contains("r1"));
        assert!(msg.contains("b1"));
    }

    #[test]
    fn test_store_error_retryability() {
        let err: LineageError = StorageError::Connection("reset by peer".to_string()).into();
        assert!(err.is_store());
        assert!(err.is_retryable());

        let err: LineageError = StorageError::Backend("schema mismatch".to_string()).into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_from_validation() {
        let err: LineageError = ValidationError::InvalidVersionNumber { value: 0 }.into();
        assert!(err.is_validation());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_internal() {
        let err = LineageError::internal("unexpected state");
        assert!(matches!(err, LineageError::Internal { .. }));
        assert!(err.to_string().contains("unexpected state"));
    }
}
