//! Filter predicates and result ordering understood by record stores.
//!
//! Deliberately small: field equality and OR across equalities. That is
//! enough for the lineage query (`id == root OR parent_simulation_id == root`)
//! and maps onto any document store's query language.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::version::{SimulationId, SimulationVersion};

/// A queryable record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// The record id.
    Id,
    /// The lineage root pointer.
    ParentSimulationId,
    /// The lifecycle status (wire text).
    Status,
}

impl Field {
    /// Stored field name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::ParentSimulationId => "parent_simulation_id",
            Self::Status => "status",
        }
    }
}

/// A filter over version records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// `field == value`.
    Eq(Field, String),
    /// Any of the inner predicates holds.
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Builds a field-equality predicate.
    #[must_use]
    pub fn eq(field: Field, value: impl Into<String>) -> Self {
        Self::Eq(field, value.into())
    }

    /// `id == root OR parent_simulation_id == root`: the whole lineage of `root`.
    #[must_use]
    pub fn lineage_of(root: &SimulationId) -> Self {
        Self::Or(vec![
            Self::eq(Field::Id, root.as_str()),
            Self::eq(Field::ParentSimulationId, root.as_str()),
        ])
    }

    /// Evaluates the predicate against a record.
    #[must_use]
    pub fn matches(&self, record: &SimulationVersion) -> bool {
        match self {
            Self::Eq(Field::Id, value) => record.id.as_str() == value,
            Self::Eq(Field::ParentSimulationId, value) => record
                .parent_simulation_id
                .as_ref()
                .is_some_and(|p| p.as_str() == value),
            Self::Eq(Field::Status, value) => record.status.as_wire() == value,
            Self::Or(clauses) => clauses.iter().any(|c| c.matches(record)),
        }
    }

    /// Flattens nested ORs into their equality clauses.
    #[must_use]
    pub fn clauses(&self) -> Vec<(Field, &str)> {
        let mut out = Vec::new();
        self.collect_clauses(&mut out);
        out
    }

    fn collect_clauses<'a>(&'a self, out: &mut Vec<(Field, &'a str)>) {
        match self {
            Self::Eq(field, value) => out.push((*field, value.as_str())),
            Self::Or(clauses) => {
                for clause in clauses {
                    clause.collect_clauses(out);
                }
            }
        }
    }
}

/// Sort order a store applies to filter results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    /// Highest version number first.
    VersionNumberDesc,
    /// Lowest version number first.
    VersionNumberAsc,
    /// Most recently created first.
    CreatedAtDesc,
}

impl Order {
    /// Compares two records under this order.
    #[must_use]
    pub fn compare(self, a: &SimulationVersion, b: &SimulationVersion) -> Ordering {
        match self {
            Self::VersionNumberDesc => b.version_number.cmp(&a.version_number),
            Self::VersionNumberAsc => a.version_number.cmp(&b.version_number),
            Self::CreatedAtDesc => b.created_at.cmp(&a.created_at),
        }
    }

    /// Sorts records in place (stable).
    pub fn sort(self, records: &mut [SimulationVersion]) {
        records.sort_by(|a, b| self.compare(a, b));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    use crate::version::{NewVersion, Payload, SimulationStatus};

    fn version(id: &str, parent: Option<&str>, number: u32) -> SimulationVersion {
        let mut record = NewVersion::root(SimulationStatus::Draft, Payload::new());
        record.parent_simulation_id = parent.map(SimulationId::new);
        record.version_number = number;
        record.into_version(SimulationId::new(id), Utc::now())
    }

    #[test]
    fn lineage_predicate_matches_root_and_branches_only() {
        let pred = Predicate::lineage_of(&SimulationId::new("r1"));
        assert!(pred.matches(&version("r1", None, 1)));
        assert!(pred.matches(&version("b1", Some("r1"), 2)));
        assert!(!pred.matches(&version("r2", None, 1)));
        assert!(!pred.matches(&version("b9", Some("r2"), 2)));
    }

    #[test]
    fn status_predicate_compares_wire_text() {
        let mut v = version("r1", None, 1);
        v.status = SimulationStatus::InProgress;
        assert!(Predicate::eq(Field::Status, "in_progress").matches(&v));
        assert!(!Predicate::eq(Field::Status, "IN_PROGRESS").matches(&v));
        assert!(!Predicate::eq(Field::Status, "draft").matches(&v));

        v.status = SimulationStatus::Custom("in-progress".to_string());
        assert!(Predicate::eq(Field::Status, "in-progress").matches(&v));
    }

    #[test]
    fn clauses_flatten_nested_or() {
        let pred = Predicate::Or(vec![
            Predicate::eq(Field::Id, "a"),
            Predicate::Or(vec![Predicate::eq(Field::ParentSimulationId, "a")]),
        ]);
        assert_eq!(
            pred.clauses(),
            vec![(Field::Id, "a"), (Field::ParentSimulationId, "a")]
        );
    }

    #[test]
    fn order_sorts() {
        let now = Utc::now();
        let mut a = version("a", None, 1);
        a.created_at = now;
        let mut b = version("b", Some("a"), 3);
        b.created_at = now + Duration::seconds(1);
        let mut c = version("c", Some("a"), 2);
        c.created_at = now + Duration::seconds(2);

        let mut records = vec![a.clone(), b.clone(), c.clone()];
        Order::VersionNumberDesc.sort(&mut records);
        assert_eq!(records.iter().map(|r| r.version_number).collect::<Vec<_>>(), vec![3, 2, 1]);

        Order::VersionNumberAsc.sort(&mut records);
        assert_eq!(records.iter().map(|r| r.version_number).collect::<Vec<_>>(), vec![1, 2, 3]);

        Order::CreatedAtDesc.sort(&mut records);
        assert_eq!(records[0].id.as_str(), "c");
        assert_eq!(records[2].id.as_str(), "a");
    }

    #[test]
    fn field_names() {
        assert_eq!(Field::ParentSimulationId.name(), "parent_simulation_id");
    }
}
