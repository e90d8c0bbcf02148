//! In-memory record store.
//!
//! Thread-safe reference implementation of [`RecordStore`]. It is intended
//! for embedded usage and tests, and its index is also the read side of the
//! persistent backend.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::storage::predicate::{Field, Order, Predicate};
use crate::storage::traits::{RecordStore, StorageError};
use crate::version::{NewVersion, SimulationId, SimulationVersion};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::Backend(format!("poisoned lock: {context}"))
}

/// Id-keyed records plus a root → branches index.
#[derive(Debug, Default)]
pub(crate) struct RecordIndex {
    by_id: HashMap<SimulationId, SimulationVersion>,
    by_parent: HashMap<SimulationId, Vec<SimulationId>>,
    last_created_at: Option<DateTime<Utc>>,
}

impl RecordIndex {
    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }

    pub(crate) fn contains(&self, id: &SimulationId) -> bool {
        self.by_id.contains_key(id)
    }

    pub(crate) fn get(&self, id: &SimulationId) -> Option<&SimulationVersion> {
        self.by_id.get(id)
    }

    /// Next creation stamp; strictly after every stamp handed out before.
    pub(crate) fn next_created_at(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.last_created_at {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        }
    }

    /// Mints an id not yet present in the index.
    pub(crate) fn next_id(&self) -> SimulationId {
        loop {
            let id = SimulationId::generate();
            if !self.by_id.contains_key(&id) {
                return id;
            }
        }
    }

    pub(crate) fn insert(&mut self, record: SimulationVersion) -> Result<(), StorageError> {
        if self.by_id.contains_key(&record.id) {
            return Err(StorageError::DuplicateKey(record.id.to_string()));
        }

        if let Some(parent) = &record.parent_simulation_id {
            self.by_parent
                .entry(parent.clone())
                .or_default()
                .push(record.id.clone());
        }
        if self.last_created_at.map_or(true, |last| record.created_at > last) {
            self.last_created_at = Some(record.created_at);
        }
        self.by_id.insert(record.id.clone(), record);
        Ok(())
    }

    /// Record in `root`'s lineage already holding `version_number`, if any.
    pub(crate) fn find_version_number(
        &self,
        root: &SimulationId,
        version_number: u32,
    ) -> Option<&SimulationVersion> {
        let root_record = self.by_id.get(root).filter(|r| r.is_root());
        let branches = self
            .by_parent
            .get(root)
            .into_iter()
            .flatten()
            .filter_map(|id| self.by_id.get(id));

        root_record
            .into_iter()
            .chain(branches)
            .find(|r| r.version_number == version_number)
    }

    pub(crate) fn filter(&self, predicate: &Predicate, order: Option<Order>) -> Vec<SimulationVersion> {
        let mut out: Vec<SimulationVersion> = match self.candidates(predicate) {
            Some(ids) => ids
                .into_iter()
                .filter_map(|id| self.by_id.get(id))
                .filter(|r| predicate.matches(r))
                .cloned()
                .collect(),
            None => self
                .by_id
                .values()
                .filter(|r| predicate.matches(r))
                .cloned()
                .collect(),
        };

        match order {
            Some(order) => order.sort(&mut out),
            // HashMap iteration order is arbitrary; keep unordered reads stable.
            None => out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))),
        }
        out
    }

    /// Index-backed candidate ids, or `None` when a full scan is needed.
    fn candidates<'a>(&'a self, predicate: &'a Predicate) -> Option<Vec<&'a SimulationId>> {
        let mut seen: HashSet<&SimulationId> = HashSet::new();
        let mut out = Vec::new();

        for (field, value) in predicate.clauses() {
            match field {
                Field::Id => {
                    if let Some((id, _)) = self.by_id.get_key_value(&SimulationId::new(value)) {
                        if seen.insert(id) {
                            out.push(id);
                        }
                    }
                }
                Field::ParentSimulationId => {
                    let branches = self.by_parent.get(&SimulationId::new(value));
                    for id in branches.into_iter().flatten() {
                        if seen.insert(id) {
                            out.push(id);
                        }
                    }
                }
                Field::Status => return None,
            }
        }

        Some(out)
    }
}

/// Thread-safe in-memory record store.
///
/// Plain `create` enforces nothing beyond fresh ids, like a typical hosted
/// document store; `create_unique` adds an atomic version-number check.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    state: RwLock<RecordIndex>,
}

impl InMemoryRecordStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully materialized record as-is (imports, fixtures).
    ///
    /// # Errors
    /// `DuplicateKey` if the id is already stored.
    pub fn insert(&self, record: SimulationVersion) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("record.insert"))?;
        state.insert(record)
    }

    /// Number of stored records.
    pub fn len(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("record.len"))?;
        Ok(state.len())
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

impl RecordStore for InMemoryRecordStore {
    fn create(&self, record: NewVersion) -> Result<SimulationVersion, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("record.create"))?;
        let created = record.into_version(state.next_id(), state.next_created_at());
        state.insert(created.clone())?;
        debug!(id = %created.id, version_number = created.version_number, "record created");
        Ok(created)
    }

    fn filter(
        &self,
        predicate: &Predicate,
        order: Option<Order>,
    ) -> Result<Vec<SimulationVersion>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("record.filter"))?;
        Ok(state.filter(predicate, order))
    }

    fn get(&self, id: &SimulationId) -> Result<Option<SimulationVersion>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("record.get"))?;
        Ok(state.get(id).cloned())
    }

    fn supports_conditional_create(&self) -> bool {
        true
    }

    fn create_unique(&self, record: NewVersion) -> Result<SimulationVersion, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("record.create_unique"))?;
        if let Some(root) = record.root_id() {
            if let Some(existing) = state.find_version_number(root, record.version_number) {
                return Err(StorageError::DuplicateVersion {
                    root_id: root.clone(),
                    version_number: record.version_number,
                    existing: existing.id.clone(),
                });
            }
        }

        let created = record.into_version(state.next_id(), state.next_created_at());
        state.insert(created.clone())?;
        debug!(id = %created.id, version_number = created.version_number, "record created (conditional)");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::version::{Payload, SimulationStatus};

    fn root_record() -> NewVersion {
        let mut payload = Payload::new();
        payload.insert("scenario".to_string(), json!("Data-center outage"));
        NewVersion::root(SimulationStatus::InProgress, payload)
    }

    fn branch_record(root: &SimulationId, number: u32) -> NewVersion {
        let mut record = root_record();
        record.parent_simulation_id = Some(root.clone());
        record.version_number = number;
        record
    }

    #[test]
    fn create_assigns_id_and_increasing_timestamps() {
        let store = InMemoryRecordStore::new();
        let a = store.create(root_record()).unwrap();
        let b = store.create(root_record()).unwrap();

        assert_ne!(a.id, b.id);
        assert!(b.created_at > a.created_at);
        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(store.get(&a.id).unwrap().unwrap(), a);
    }

    #[test]
    fn lineage_filter_uses_parent_index() {
        let store = InMemoryRecordStore::new();
        let root = store.create(root_record()).unwrap();
        let other_root = store.create(root_record()).unwrap();
        store.create(branch_record(&root.id, 2)).unwrap();
        store.create(branch_record(&root.id, 3)).unwrap();
        store.create(branch_record(&other_root.id, 2)).unwrap();

        let lineage = store
            .filter(&Predicate::lineage_of(&root.id), Some(Order::VersionNumberDesc))
            .unwrap();
        assert_eq!(
            lineage.iter().map(|r| r.version_number).collect::<Vec<_>>(),
            vec![3, 2, 1]
        );
        assert!(lineage.iter().all(|r| r.root_id() == &root.id));
    }

    #[test]
    fn status_filter_scans() {
        let store = InMemoryRecordStore::new();
        let root = store.create(root_record()).unwrap();
        let mut draft = branch_record(&root.id, 2);
        draft.status = SimulationStatus::Draft;
        store.create(draft).unwrap();

        let drafts = store.filter(&Predicate::eq(Field::Status, "draft"), None).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].version_number, 2);
    }

    #[test]
    fn plain_create_allows_duplicate_numbers() {
        let store = InMemoryRecordStore::new();
        let root = store.create(root_record()).unwrap();
        store.create(branch_record(&root.id, 2)).unwrap();
        store.create(branch_record(&root.id, 2)).unwrap();

        let lineage = store.filter(&Predicate::lineage_of(&root.id), None).unwrap();
        assert_eq!(lineage.len(), 3);
    }

    #[test]
    fn create_unique_rejects_taken_number() {
        let store = InMemoryRecordStore::new();
        assert!(store.supports_conditional_create());
        let root = store.create(root_record()).unwrap();
        let first = store.create_unique(branch_record(&root.id, 2)).unwrap();

        let err = store.create_unique(branch_record(&root.id, 2)).unwrap_err();
        match err {
            StorageError::DuplicateVersion { existing, version_number, .. } => {
                assert_eq!(existing, first.id);
                assert_eq!(version_number, 2);
            }
            other => panic!("unexpected error: {other}"),
        }

        // The root's own number is part of the lineage too.
        assert!(matches!(
            store.create_unique(branch_record(&root.id, 1)),
            Err(StorageError::DuplicateVersion { .. })
        ));
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn insert_rejects_duplicate_ids() {
        let store = InMemoryRecordStore::new();
        let record = root_record().into_version(SimulationId::new("r1"), Utc::now());
        store.insert(record.clone()).unwrap();
        assert!(matches!(store.insert(record), Err(StorageError::DuplicateKey(_))));
    }

    #[test]
    fn insert_keeps_timestamps_monotonic_for_later_creates() {
        let store = InMemoryRecordStore::new();
        let future = Utc::now() + Duration::hours(1);
        let record = root_record().into_version(SimulationId::new("r1"), future);
        store.insert(record).unwrap();

        let created = store.create(branch_record(&SimulationId::new("r1"), 2)).unwrap();
        assert!(created.created_at > future);
    }

    #[test]
    fn unknown_id_yields_none_and_empty_filter() {
        let store = InMemoryRecordStore::new();
        assert!(store.is_empty().unwrap());
        let missing = SimulationId::new("unknown-id");
        assert!(store.get(&missing).unwrap().is_none());
        assert!(store.filter(&Predicate::lineage_of(&missing), None).unwrap().is_empty());
    }
}
