//! Multi-dimension grouping primitive
//!
//! Partitions a record set by an ordered list of grouping dimensions into a
//! tree of `GroupNode`s. A node's children partition its own record set
//! exactly: no record is counted twice and none is dropped, so children's
//! additive metrics sum to the parent's.

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tally_core::TimeRecord;

/// Axis along which records are partitioned for aggregate reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Client,
    Project,
    User,
    Task,
    Week,
    Month,
}

impl Dimension {
    /// Partition key and display name for one record on this axis.
    pub fn key_of(&self, record: &TimeRecord) -> (String, String) {
        match self {
            Dimension::Client => (record.client_id.to_string(), record.client_name.clone()),
            Dimension::Project => (record.project_id.to_string(), record.project_name.clone()),
            Dimension::User => (record.user_id.to_string(), record.user_name.clone()),
            Dimension::Task => (record.task_id.to_string(), record.task_name.clone()),
            Dimension::Week => {
                let week = record.spent_date.iso_week();
                let label = format!("{}-W{:02}", week.year(), week.week());
                (label.clone(), label)
            }
            Dimension::Month => {
                let label = format!(
                    "{}-{:02}",
                    record.spent_date.year(),
                    record.spent_date.month()
                );
                (label.clone(), label)
            }
        }
    }
}

/// One node of a grouped report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupNode<M> {
    pub key: String,
    pub name: String,
    pub dimension: Dimension,
    pub metrics: M,
    pub children: Vec<GroupNode<M>>,
}

/// Build a grouped tree over `records`.
///
/// `compute` receives the dimension, the group key, and the group's records;
/// `sort_key` orders sibling nodes descending. Recurses on the remaining
/// dimensions inside each group.
pub fn build_tree<M>(
    records: &[&TimeRecord],
    dimensions: &[Dimension],
    compute: &impl Fn(Dimension, &str, &[&TimeRecord]) -> M,
    sort_key: &impl Fn(&M) -> f64,
) -> Vec<GroupNode<M>> {
    let Some((&dimension, rest)) = dimensions.split_first() else {
        return Vec::new();
    };

    // Partition preserving first-seen order; sorted below.
    let mut order: Vec<String> = Vec::new();
    let mut names: HashMap<String, String> = HashMap::new();
    let mut buckets: HashMap<String, Vec<&TimeRecord>> = HashMap::new();
    for record in records {
        let (key, name) = dimension.key_of(record);
        if !buckets.contains_key(&key) {
            order.push(key.clone());
            names.insert(key.clone(), name);
        }
        buckets.entry(key).or_default().push(record);
    }

    let mut nodes: Vec<GroupNode<M>> = order
        .into_iter()
        .map(|key| {
            let group = buckets.remove(&key).unwrap_or_default();
            let metrics = compute(dimension, &key, &group);
            let children = build_tree(&group, rest, compute, sort_key);
            let name = names.remove(&key).unwrap_or_else(|| key.clone());
            GroupNode {
                key,
                name,
                dimension,
                metrics,
                children,
            }
        })
        .collect();

    nodes.sort_by(|a, b| {
        sort_key(&b.metrics)
            .partial_cmp(&sort_key(&a.metrics))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    nodes
}

/// Round a monetary, hour, or percentage value to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// =============================================================================
// TESTS
// =============================================================================


#[cfg(test)]
mod tests {
    use super::test_support::record;
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_round2() {
        assert_eq!(round2(33.333333), 33.33);
        assert_eq!(round2(10.0 / 3.0), 3.33);
        assert_eq!(round2(0.1 + 0.2), 0.3);
        assert_eq!(round2(50.0), 50.0);
    }

    #[test]
    fn test_dimension_keys() {
        let mut r = record(1);
        r.spent_date = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        assert_eq!(Dimension::Client.key_of(&r), ("1".to_string(), "Acme".to_string()));
        assert_eq!(Dimension::Week.key_of(&r).0, "2024-W01");
        assert_eq!(Dimension::Month.key_of(&r).0, "2024-01");
    }

    #[test]
    fn test_single_dimension_partition() {
        let mut a = record(1);
        a.client_id = 1;
        let mut b = record(2);
        b.client_id = 2;
        b.client_name = "Globex".to_string();
        let mut c = record(3);
        c.client_id = 1;
        c.hours = 4.0;

        let records: Vec<&TimeRecord> = vec![&a, &b, &c];
        let tree = build_tree(
            &records,
            &[Dimension::Client],
            &|_, _, group| group.iter().map(|r| r.hours).sum::<f64>(),
            &|hours| *hours,
        );

        assert_eq!(tree.len(), 2);
        // Sorted by metric descending: Acme has 5.0 hours, Globex 1.0.
        assert_eq!(tree[0].name, "Acme");
        assert_eq!(tree[0].metrics, 5.0);
        assert_eq!(tree[1].name, "Globex");
        assert!(tree[0].children.is_empty());
    }

    #[test]
    fn test_nested_dimensions_sum_to_parent() {
        let mut a = record(1);
        a.user_id = 10;
        let mut b = record(2);
        b.user_id = 20;
        b.user_name = "Sam Field".to_string();
        let mut c = record(3);
        c.user_id = 10;

        let records: Vec<&TimeRecord> = vec![&a, &b, &c];
        let tree = build_tree(
            &records,
            &[Dimension::Client, Dimension::User],
            &|_, _, group| group.len(),
            &|count| *count as f64,
        );

        assert_eq!(tree.len(), 1);
        let client = &tree[0];
        assert_eq!(client.metrics, 3);
        assert_eq!(client.children.len(), 2);
        let child_sum: usize = client.children.iter().map(|c| c.metrics).sum();
        assert_eq!(child_sum, client.metrics);
        assert_eq!(client.children[0].dimension, Dimension::User);
    }

    #[test]
    fn test_empty_dimensions_yield_no_nodes() {
        let a = record(1);
        let records: Vec<&TimeRecord> = vec![&a];
        let tree = build_tree(&records, &[], &|_, _, group| group.len(), &|c| *c as f64);
        assert!(tree.is_empty());
    }
}
