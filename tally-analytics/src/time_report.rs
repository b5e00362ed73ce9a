//! Time aggregation calculator
//!
//! Plain hour and amount sums over the requested dimensions. No rate
//! resolution happens here; billable amounts come straight from the
//! records' own rates.

use crate::grouping::{build_tree, round2, Dimension, GroupNode};
use serde::{Deserialize, Serialize};
use tally_core::TimeRecord;

/// Time report query parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeReportParams {
    pub dimensions: Vec<Dimension>,
}

impl Default for TimeReportParams {
    fn default() -> Self {
        Self {
            dimensions: vec![Dimension::Project, Dimension::Task],
        }
    }
}

/// Metrics for one group (or the report totals).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeMetrics {
    pub total_hours: f64,
    pub rounded_hours: f64,
    pub billable_hours: f64,
    pub billable_amount: f64,
    pub entry_count: usize,
}

/// Full time report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeReport {
    pub totals: TimeMetrics,
    pub groups: Vec<GroupNode<TimeMetrics>>,
}

/// Aggregate hours over a record set.
pub fn calculate_time_report(records: &[TimeRecord], params: &TimeReportParams) -> TimeReport {
    let refs: Vec<&TimeRecord> = records.iter().collect();
    let totals = time_metrics(&refs);
    let groups = build_tree(
        &refs,
        &params.dimensions,
        &|_, _, group| time_metrics(group),
        &|metrics| metrics.total_hours,
    );
    TimeReport { totals, groups }
}

fn time_metrics(group: &[&TimeRecord]) -> TimeMetrics {
    let total_hours: f64 = group.iter().map(|r| r.hours).sum();
    let rounded_hours: f64 = group.iter().map(|r| r.rounded_hours).sum();
    let billable_hours: f64 = group.iter().filter(|r| r.billable).map(|r| r.hours).sum();
    let billable_amount: f64 = group
        .iter()
        .filter(|r| r.billable)
        .map(|r| r.hours * r.billable_rate.unwrap_or(0.0))
        .sum();

    TimeMetrics {
        total_hours: round2(total_hours),
        rounded_hours: round2(rounded_hours),
        billable_hours: round2(billable_hours),
        billable_amount: round2(billable_amount),
        entry_count: group.len(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
