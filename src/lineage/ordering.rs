//! Version ordering and lineage integrity checks.
//!
//! Shared by the resolver (display order) and the branch creator (next
//! number, first-writer arbitration). The record store enforces no
//! uniqueness, so every comparison here falls through to a total order.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::version::{SimulationId, SimulationVersion};

/// Newest first: version number, then creation time, then id, all descending.
#[must_use]
pub fn compare_newest_first(a: &SimulationVersion, b: &SimulationVersion) -> Ordering {
    b.version_number
        .cmp(&a.version_number)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| b.id.cmp(&a.id))
}

/// Sorts versions newest first.
pub fn sort_newest_first(versions: &mut [SimulationVersion]) {
    versions.sort_by(compare_newest_first);
}

/// Highest version number present, 0 for an empty slice.
#[must_use]
pub fn max_version_number(versions: &[SimulationVersion]) -> u32 {
    versions.iter().map(|v| v.version_number).max().unwrap_or(0)
}

/// Number the next branch of this lineage receives.
///
/// # Errors
/// `VersionNumberExhausted` if the lineage already reached `u32::MAX`.
pub fn next_version_number(
    root_id: &SimulationId,
    versions: &[SimulationVersion],
) -> Result<u32, ValidationError> {
    max_version_number(versions)
        .checked_add(1)
        .ok_or_else(|| ValidationError::VersionNumberExhausted {
            root_id: root_id.clone(),
        })
}

/// The record that owns `version_number`: the earliest created, ties by id.
#[must_use]
pub fn first_writer(versions: &[SimulationVersion], version_number: u32) -> Option<&SimulationVersion> {
    versions
        .iter()
        .filter(|v| v.version_number == version_number)
        .min_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
}

/// Integrity audit of one lineage.
///
/// Reports what is stored; nothing is repaired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageReport {
    /// Root the lineage was resolved against.
    pub root_id: SimulationId,
    /// Number of versions examined.
    pub version_count: usize,
    /// Versions without a parent pointer.
    pub roots: Vec<SimulationId>,
    /// Versions whose parent pointer is not the lineage root, including a
    /// "root" record that itself points elsewhere.
    pub misparented: Vec<SimulationId>,
    /// Version numbers held by more than one version.
    pub duplicate_numbers: BTreeMap<u32, Vec<SimulationId>>,
    /// Whether the lowest version number is 1.
    pub starts_at_one: bool,
    /// Whether the numbers form 1..=n with no gaps.
    pub contiguous: bool,
}

impl LineageReport {
    /// Audits `versions` as the lineage of `root_id`.
    #[must_use]
    pub fn audit(root_id: &SimulationId, versions: &[SimulationVersion]) -> Self {
        let roots = versions
            .iter()
            .filter(|v| v.is_root())
            .map(|v| v.id.clone())
            .collect();

        let misparented = versions
            .iter()
            .filter(|v| {
                if &v.id == root_id {
                    v.parent_simulation_id.is_some()
                } else {
                    v.parent_simulation_id.as_ref() != Some(root_id)
                }
            })
            .map(|v| v.id.clone())
            .collect();

        let mut by_number: BTreeMap<u32, Vec<SimulationId>> = BTreeMap::new();
        for v in versions {
            by_number.entry(v.version_number).or_default().push(v.id.clone());
        }

        let starts_at_one = by_number.keys().next() == Some(&1);
        let contiguous = starts_at_one
            && by_number.keys().last().copied() == u32::try_from(by_number.len()).ok();

        let duplicate_numbers = by_number.into_iter().filter(|(_, ids)| ids.len() > 1).collect();

        Self {
            root_id: root_id.clone(),
            version_count: versions.len(),
            roots,
            misparented,
            duplicate_numbers,
            starts_at_one,
            contiguous,
        }
    }

    /// One root, flat parentage, unique numbers starting at 1.
    ///
    /// Gaps in the numbering are allowed.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.roots.len() == 1
            && self.misparented.is_empty()
            && self.duplicate_numbers.is_empty()
            && self.starts_at_one
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    use crate::version::{NewVersion, Payload, SimulationStatus};

    fn version(id: &str, parent: Option<&str>, number: u32, offset_secs: i64) -> SimulationVersion {
        let mut record = NewVersion::root(SimulationStatus::Draft, Payload::new());
        record.parent_simulation_id = parent.map(SimulationId::new);
        record.version_number = number;
        record.into_version(SimulationId::new(id), Utc::now() + Duration::seconds(offset_secs))
    }

    #[test]
    fn newest_first_breaks_ties_by_created_at() {
        let mut versions = vec![
            version("r1", None, 1, 0),
            version("b1", Some("r1"), 2, 1),
            version("b2", Some("r1"), 2, 2),
            version("b3", Some("r1"), 3, 3),
        ];
        sort_newest_first(&mut versions);
        let ids: Vec<_> = versions.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["b3", "b2", "b1", "r1"]);
    }

    #[test]
    fn newest_first_is_total_on_identical_stamps() {
        let now = Utc::now();
        let mut a = version("a", Some("r1"), 2, 0);
        let mut b = version("b", Some("r1"), 2, 0);
        a.created_at = now;
        b.created_at = now;
        assert_eq!(compare_newest_first(&a, &b), Ordering::Greater);
        assert_eq!(compare_newest_first(&b, &a), Ordering::Less);
    }

    #[test]
    fn next_number_is_max_plus_one() {
        let root = SimulationId::new("r1");
        let versions = vec![version("r1", None, 1, 0), version("b4", Some("r1"), 4, 1)];
        assert_eq!(next_version_number(&root, &versions).unwrap(), 5);
        assert_eq!(next_version_number(&root, &[]).unwrap(), 1);

        let full = vec![version("r1", None, u32::MAX, 0)];
        assert!(matches!(
            next_version_number(&root, &full),
            Err(ValidationError::VersionNumberExhausted { .. })
        ));
    }

    #[test]
    fn first_writer_is_earliest_created() {
        let versions = vec![
            version("late", Some("r1"), 2, 5),
            version("early", Some("r1"), 2, 1),
            version("r1", None, 1, 0),
        ];
        assert_eq!(first_writer(&versions, 2).unwrap().id.as_str(), "early");
        assert!(first_writer(&versions, 9).is_none());
    }

    #[test]
    fn audit_of_healthy_lineage() {
        let versions = vec![
            version("r1", None, 1, 0),
            version("b1", Some("r1"), 2, 1),
            version("b2", Some("r1"), 3, 2),
        ];
        let report = LineageReport::audit(&SimulationId::new("r1"), &versions);
        assert!(report.is_consistent());
        assert!(report.contiguous);
        assert_eq!(report.version_count, 3);
    }

    #[test]
    fn audit_flags_duplicates_and_gaps() {
        let versions = vec![
            version("r1", None, 1, 0),
            version("b1", Some("r1"), 2, 1),
            version("b2", Some("r1"), 2, 2),
            version("b3", Some("r1"), 5, 3),
        ];
        let report = LineageReport::audit(&SimulationId::new("r1"), &versions);
        assert!(!report.is_consistent());
        assert!(!report.contiguous);
        assert_eq!(
            report.duplicate_numbers.get(&2).unwrap(),
            &vec![SimulationId::new("b1"), SimulationId::new("b2")]
        );
    }

    #[test]
    fn audit_flags_deep_parentage() {
        // "b1" was resolved as a root but itself points at "r1".
        let versions = vec![version("b1", Some("r1"), 2, 0), version("b2", Some("b1"), 3, 1)];
        let report = LineageReport::audit(&SimulationId::new("b1"), &versions);
        assert!(report.roots.is_empty());
        assert_eq!(report.misparented, vec![SimulationId::new("b1")]);
        assert!(!report.starts_at_one);
        assert!(!report.is_consistent());
    }
}
