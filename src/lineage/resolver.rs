//! Lineage resolution.
//!
//! Any version id leads to its lineage root in one hop (`parent_simulation_id`
//! already *is* the root), and the whole lineage is then a single
//! `id == root OR parent_simulation_id == root` query. No recursive walks.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{LineageError, LineageResult};
use crate::lineage::ordering::{self, LineageReport};
use crate::storage::{Order, Predicate, RecordStore};
use crate::version::{SimulationId, SimulationStatus, SimulationVersion};

/// One row of a version selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSummary {
    /// Version id.
    pub id: SimulationId,
    /// Position in the lineage.
    pub version_number: u32,
    /// Optional annotation.
    pub version_label: Option<String>,
    /// Lifecycle tag.
    pub status: SimulationStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Whether this is the lineage root.
    pub is_root: bool,
    /// Short name, e.g. `v2 · alt-approach`.
    pub display_label: String,
}

impl From<&SimulationVersion> for VersionSummary {
    fn from(v: &SimulationVersion) -> Self {
        Self {
            id: v.id.clone(),
            version_number: v.version_number,
            version_label: v.version_label.clone(),
            status: v.status.clone(),
            created_at: v.created_at,
            is_root: v.is_root(),
            display_label: v.display_label(),
        }
    }
}

/// All versions of one lineage, newest first.
///
/// Never empty: a lineage is only produced for an id that resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lineage {
    root_id: SimulationId,
    versions: Vec<SimulationVersion>,
}

impl Lineage {
    /// Builds a lineage view, ordering `versions` newest first.
    #[must_use]
    pub fn new(root_id: SimulationId, mut versions: Vec<SimulationVersion>) -> Self {
        ordering::sort_newest_first(&mut versions);
        Self { root_id, versions }
    }

    /// Id of the lineage root.
    #[must_use]
    pub fn root_id(&self) -> &SimulationId {
        &self.root_id
    }

    /// Versions, newest first.
    #[must_use]
    pub fn versions(&self) -> &[SimulationVersion] {
        &self.versions
    }

    /// Consumes the view, returning the versions newest first.
    #[must_use]
    pub fn into_versions(self) -> Vec<SimulationVersion> {
        self.versions
    }

    /// The root record, if the store returned it.
    #[must_use]
    pub fn root(&self) -> Option<&SimulationVersion> {
        self.versions.iter().find(|v| v.id == self.root_id)
    }

    /// The version with the highest number.
    #[must_use]
    pub fn latest(&self) -> Option<&SimulationVersion> {
        self.versions.first()
    }

    /// Highest version number in the lineage.
    #[must_use]
    pub fn max_version_number(&self) -> u32 {
        ordering::max_version_number(&self.versions)
    }

    /// Versions carrying `version_number` (more than one only after a race).
    pub fn find_by_number(&self, version_number: u32) -> impl Iterator<Item = &SimulationVersion> {
        self.versions
            .iter()
            .filter(move |v| v.version_number == version_number)
    }

    /// The version with the given id.
    #[must_use]
    pub fn get(&self, id: &SimulationId) -> Option<&SimulationVersion> {
        self.versions.iter().find(|v| &v.id == id)
    }

    /// Number of versions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Returns true if the lineage holds no versions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Version-selector rows, newest first.
    #[must_use]
    pub fn summaries(&self) -> Vec<VersionSummary> {
        self.versions.iter().map(VersionSummary::from).collect()
    }

    /// Integrity audit of the stored lineage.
    #[must_use]
    pub fn check(&self) -> LineageReport {
        LineageReport::audit(&self.root_id, &self.versions)
    }
}

impl<'a> IntoIterator for &'a Lineage {
    type Item = &'a SimulationVersion;
    type IntoIter = std::slice::Iter<'a, SimulationVersion>;

    fn into_iter(self) -> Self::IntoIter {
        self.versions.iter()
    }
}

/// Resolves any version id to its full lineage.
#[derive(Clone)]
pub struct LineageResolver {
    store: Arc<dyn RecordStore>,
}

impl LineageResolver {
    /// Create a resolver over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Returns every version sharing `simulation_id`'s root, newest first.
    ///
    /// The stored root pointer is trusted as-is; a version whose
    /// `parent_simulation_id` names a non-root yields whatever that pointer
    /// selects.
    ///
    /// # Errors
    /// - `NotFound` if `simulation_id` is not stored
    /// - `Store` if the record store fails
    #[instrument(skip_all, fields(simulation_id = %simulation_id))]
    pub fn resolve_lineage(&self, simulation_id: &SimulationId) -> LineageResult<Lineage> {
        let version = self
            .store
            .get(simulation_id)?
            .ok_or_else(|| LineageError::not_found(simulation_id))?;
        let root_id = version.root_id().clone();

        let versions = self
            .store
            .filter(&Predicate::lineage_of(&root_id), Some(Order::VersionNumberDesc))?;
        if versions.is_empty() {
            // The record was readable a moment ago; treat it as gone.
            warn!(root_id = %root_id, "lineage query returned nothing for a stored version");
            return Err(LineageError::not_found(simulation_id));
        }

        let lineage = Lineage::new(root_id, versions);
        debug!(
            root_id = %lineage.root_id(),
            versions = lineage.len(),
            max_version_number = lineage.max_version_number(),
            "lineage resolved"
        );
        Ok(lineage)
    }

    /// Fetches a single version.
    ///
    /// # Errors
    /// `NotFound` if the id is not stored.
    pub fn get(&self, simulation_id: &SimulationId) -> LineageResult<SimulationVersion> {
        self.store
            .get(simulation_id)?
            .ok_or_else(|| LineageError::not_found(simulation_id))
    }

    /// The record store this resolver reads.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }
}

impl std::fmt::Debug for LineageResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineageResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::storage::InMemoryRecordStore;
    use crate::version::{NewVersion, Payload};

    fn seeded() -> (Arc<InMemoryRecordStore>, SimulationVersion) {
        let store = Arc::new(InMemoryRecordStore::new());
        let mut payload = Payload::new();
        payload.insert("scenario".to_string(), json!("Board asks for layoffs"));
        let root = NewVersion::root(SimulationStatus::Completed, payload)
            .into_version(SimulationId::new("r1"), Utc::now());
        store.insert(root.clone()).unwrap();
        (store, root)
    }

    fn add_branch(store: &InMemoryRecordStore, root: &SimulationVersion, number: u32, label: Option<&str>) -> SimulationVersion {
        let mut record = NewVersion::root(SimulationStatus::Draft, root.payload.clone()).with_label(label);
        record.parent_simulation_id = Some(root.id.clone());
        record.version_number = number;
        store.create(record).unwrap()
    }

    #[test]
    fn root_alone_is_its_own_lineage() {
        let (store, root) = seeded();
        let resolver = LineageResolver::new(store);

        let lineage = resolver.resolve_lineage(&root.id).unwrap();
        assert_eq!(lineage.versions(), &[root.clone()]);
        assert_eq!(lineage.root(), Some(&root));
        assert_eq!(lineage.max_version_number(), 1);
    }

    #[test]
    fn any_member_resolves_to_same_lineage() {
        let (store, root) = seeded();
        let b1 = add_branch(&store, &root, 2, Some("alt-approach"));
        let b2 = add_branch(&store, &root, 3, None);
        let resolver = LineageResolver::new(store);

        let from_root = resolver.resolve_lineage(&root.id).unwrap();
        let from_branch = resolver.resolve_lineage(&b1.id).unwrap();
        assert_eq!(from_root, from_branch);

        let ids: Vec<_> = from_root.versions().iter().map(|v| v.id.clone()).collect();
        assert_eq!(ids, vec![b2.id, b1.id, root.id]);
    }

    #[test]
    fn unknown_id_is_not_found() {
        let (store, _) = seeded();
        let resolver = LineageResolver::new(store);
        let err = resolver.resolve_lineage(&SimulationId::new("unknown-id")).unwrap_err();
        assert!(err.is_not_found());
        assert!(resolver.get(&SimulationId::new("unknown-id")).unwrap_err().is_not_found());
    }

    #[test]
    fn other_lineages_are_excluded() {
        let (store, root) = seeded();
        let other = store
            .create(NewVersion::root(SimulationStatus::Draft, Payload::new()))
            .unwrap();
        add_branch(&store, &other, 2, None);
        let resolver = LineageResolver::new(store);

        let lineage = resolver.resolve_lineage(&root.id).unwrap();
        assert_eq!(lineage.len(), 1);
    }

    #[test]
    fn deep_pointer_is_trusted_not_repaired() {
        let (store, root) = seeded();
        let b1 = add_branch(&store, &root, 2, None);
        // Violates flat parentage: points at b1 instead of the root.
        let mut stray = NewVersion::root(SimulationStatus::Draft, Payload::new());
        stray.parent_simulation_id = Some(b1.id.clone());
        stray.version_number = 3;
        let stray = store.create(stray).unwrap();
        let resolver = LineageResolver::new(store);

        let lineage = resolver.resolve_lineage(&stray.id).unwrap();
        assert_eq!(lineage.root_id(), &b1.id);
        let ids: Vec<_> = lineage.versions().iter().map(|v| v.id.clone()).collect();
        assert_eq!(ids, vec![stray.id, b1.id]);
        assert!(!lineage.check().is_consistent());
    }

    #[test]
    fn summaries_follow_lineage_order() {
        let (store, root) = seeded();
        add_branch(&store, &root, 2, Some("alt-approach"));
        let resolver = LineageResolver::new(store);

        let rows = resolver.resolve_lineage(&root.id).unwrap().summaries();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].display_label, "v2 · alt-approach");
        assert!(!rows[0].is_root);
        assert_eq!(rows[1].display_label, "v1");
        assert!(rows[1].is_root);
    }

    #[test]
    fn find_by_number_and_get() {
        let (store, root) = seeded();
        let b1 = add_branch(&store, &root, 2, None);
        let resolver = LineageResolver::new(store);
        let lineage = resolver.resolve_lineage(&root.id).unwrap();

        assert_eq!(lineage.find_by_number(2).count(), 1);
        assert_eq!(lineage.get(&b1.id).unwrap().version_number, 2);
        assert_eq!(lineage.latest().unwrap().id, b1.id);
        assert_eq!((&lineage).into_iter().count(), 2);
    }
}
