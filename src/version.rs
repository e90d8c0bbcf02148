//! Simulation version records.
//!
//! A `SimulationVersion` is the only entity the lineage core knows about.
//! Its versioning fields (`parent_simulation_id`, `version_number`) are
//! write-once; everything the simulation actually contains lives in an
//! opaque [`Payload`] that is copied, never interpreted.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Opaque simulation content: scenario text, roles, analysis results.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Opaque, store-assigned simulation identifier.
///
/// # Examples
///
/// ```
/// use simlineage::SimulationId;
///
/// let id = SimulationId::new("r1");
/// assert_eq!(id.as_str(), "r1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimulationId(String);

impl SimulationId {
    /// Wraps an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the identifier is empty or whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for SimulationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SimulationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SimulationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SimulationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Lifecycle tag of a simulation.
///
/// Independent of versioning: branches start as [`SimulationStatus::Draft`]
/// and everything after that belongs to whoever runs the simulation.
///
/// On the wire a status is its text. The four keywords (`draft`,
/// `in_progress`, `completed`, `archived`) map to the named variants; any
/// other text is kept verbatim in `Custom` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SimulationStatus {
    /// Being authored; the status every new branch starts in.
    #[default]
    Draft,
    /// Role-play is under way.
    InProgress,
    /// Finished and analysed.
    Completed,
    /// Kept for reference only.
    Archived,
    /// Any other status a caller tracks, stored as given.
    Custom(String),
}

impl SimulationStatus {
    const DRAFT: &'static str = "draft";
    const IN_PROGRESS: &'static str = "in_progress";
    const COMPLETED: &'static str = "completed";
    const ARCHIVED: &'static str = "archived";

    /// Returns the wire text of the status.
    #[must_use]
    pub fn as_wire(&self) -> &str {
        match self {
            Self::Draft => Self::DRAFT,
            Self::InProgress => Self::IN_PROGRESS,
            Self::Completed => Self::COMPLETED,
            Self::Archived => Self::ARCHIVED,
            Self::Custom(text) => text,
        }
    }

    /// Checks that the status reads back as itself.
    ///
    /// # Errors
    /// `InvalidStatus` for a blank `Custom` text or a `Custom` spelling one
    /// of the keywords.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let Self::Custom(text) = self else {
            return Ok(());
        };
        if text.trim().is_empty() {
            return Err(ValidationError::InvalidStatus {
                reason: "custom status cannot be blank".to_string(),
            });
        }
        if !matches!(Self::from(text.as_str()), Self::Custom(_)) {
            return Err(ValidationError::InvalidStatus {
                reason: format!("custom status {text:?} shadows a built-in status"),
            });
        }
        Ok(())
    }
}

impl From<&str> for SimulationStatus {
    fn from(value: &str) -> Self {
        match value {
            Self::DRAFT => Self::Draft,
            Self::IN_PROGRESS => Self::InProgress,
            Self::COMPLETED => Self::Completed,
            Self::ARCHIVED => Self::Archived,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for SimulationStatus {
    fn from(value: String) -> Self {
        match Self::from(value.as_str()) {
            Self::Custom(_) => Self::Custom(value),
            known => known,
        }
    }
}

impl From<SimulationStatus> for String {
    fn from(value: SimulationStatus) -> Self {
        match value {
            SimulationStatus::Custom(text) => text,
            known => known.as_wire().to_string(),
        }
    }
}

impl fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// One stored version of a simulation.
///
/// `parent_simulation_id` names the lineage *root*, not the version this one
/// was branched from: every lineage is a flat star around its root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationVersion {
    /// Store-assigned identifier.
    pub id: SimulationId,

    /// Lineage root, absent on the root itself.
    #[serde(default)]
    pub parent_simulation_id: Option<SimulationId>,

    /// Position in the lineage, 1 for the root.
    pub version_number: u32,

    /// Free-text annotation; not used for ordering or identity.
    #[serde(default)]
    pub version_label: Option<String>,

    /// Lifecycle tag.
    #[serde(default)]
    pub status: SimulationStatus,

    /// Store-assigned creation time.
    pub created_at: DateTime<Utc>,

    /// Opaque simulation content.
    #[serde(default)]
    pub payload: Payload,
}

impl SimulationVersion {
    /// Returns the id of the lineage this version belongs to.
    #[must_use]
    pub fn root_id(&self) -> &SimulationId {
        self.parent_simulation_id.as_ref().unwrap_or(&self.id)
    }

    /// Returns true if this version is the root of its lineage.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_simulation_id.is_none()
    }

    /// Short human-readable name, e.g. `v2 · alt-approach`.
    #[must_use]
    pub fn display_label(&self) -> String {
        match self.version_label.as_deref() {
            Some(label) => format!("v{} · {label}", self.version_number),
            None => format!("v{}", self.version_number),
        }
    }
}

/// A version record that has not been persisted yet.
///
/// Carries no `id` and no `created_at`; the record store assigns both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVersion {
    /// Lineage root, absent when creating a root.
    pub parent_simulation_id: Option<SimulationId>,
    /// Position in the lineage.
    pub version_number: u32,
    /// Optional annotation.
    pub version_label: Option<String>,
    /// Lifecycle tag.
    pub status: SimulationStatus,
    /// Opaque simulation content.
    pub payload: Payload,
}

impl NewVersion {
    /// Builds the first version of a new lineage.
    #[must_use]
    pub fn root(status: SimulationStatus, payload: Payload) -> Self {
        Self {
            parent_simulation_id: None,
            version_number: 1,
            version_label: None,
            status,
            payload,
        }
    }

    /// Sets the label, trimming it and dropping it when blank.
    #[must_use]
    pub fn with_label(mut self, label: Option<impl Into<String>>) -> Self {
        self.version_label = normalize_label(label.map(Into::into));
        self
    }

    /// Checks the versioning fields before the record is handed to a store.
    ///
    /// # Errors
    /// Returns a [`ValidationError`] naming the first offending field.
    pub fn validate(&self, max_label_len: usize) -> Result<(), ValidationError> {
        self.status.validate()?;

        if self.version_number == 0 {
            return Err(ValidationError::InvalidVersionNumber { value: 0 });
        }

        match &self.parent_simulation_id {
            None if self.version_number != 1 => {
                return Err(ValidationError::RootVersionNumber {
                    value: self.version_number,
                });
            }
            Some(parent) if parent.is_blank() => {
                return Err(ValidationError::EmptyIdentifier {
                    field: "parent_simulation_id",
                });
            }
            _ => {}
        }

        if let Some(label) = &self.version_label {
            let len = label.chars().count();
            if len > max_label_len {
                return Err(ValidationError::LabelTooLong { len, max_len: max_label_len });
            }
        }

        Ok(())
    }

    /// Materializes the record with store-assigned identity.
    #[must_use]
    pub fn into_version(self, id: SimulationId, created_at: DateTime<Utc>) -> SimulationVersion {
        SimulationVersion {
            id,
            parent_simulation_id: self.parent_simulation_id,
            version_number: self.version_number,
            version_label: self.version_label,
            status: self.status,
            created_at,
            payload: self.payload,
        }
    }

    /// Id of the lineage this record will join, if it is not a root.
    #[must_use]
    pub fn root_id(&self) -> Option<&SimulationId> {
        self.parent_simulation_id.as_ref()
    }
}

pub(crate) fn normalize_label(label: Option<String>) -> Option<String> {
    label
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
}
