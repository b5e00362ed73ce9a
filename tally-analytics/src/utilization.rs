//! Utilization calculator
//!
//! Logged hours against capacity over a date range. Capacity counts the
//! days in the range (weekends excluded by default) times hours per day
//! times the number of active people.

use crate::grouping::{build_tree, round2, Dimension, GroupNode};
use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tally_core::constants::DEFAULT_CAPACITY_HOURS_PER_DAY;
use tally_core::TimeRecord;

/// Utilization query parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilizationParams {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub capacity_hours_per_day: f64,
    /// Whether Saturdays and Sundays are dropped from capacity.
    pub exclude_weekends: bool,
    /// Overrides the active-user count for total capacity. When absent, the
    /// distinct users appearing in the records are counted.
    pub active_users: Option<usize>,
    pub dimensions: Vec<Dimension>,
}

impl UtilizationParams {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from,
            to,
            capacity_hours_per_day: DEFAULT_CAPACITY_HOURS_PER_DAY,
            exclude_weekends: true,
            active_users: None,
            dimensions: vec![Dimension::User],
        }
    }
}

/// Metrics for one group (or the report totals).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtilizationMetrics {
    pub total_hours: f64,
    pub billable_hours: f64,
    pub capacity_hours: f64,
    pub utilization_pct: f64,
    pub billable_utilization_pct: f64,
    /// Billable share of logged hours, independent of capacity.
    pub billable_ratio_pct: f64,
    pub active_users: usize,
    pub entry_count: usize,
}

/// Full utilization report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UtilizationReport {
    pub working_days: u32,
    pub totals: UtilizationMetrics,
    pub groups: Vec<GroupNode<UtilizationMetrics>>,
    pub warnings: Vec<String>,
}

/// Capacity days in `[from, to]`, both endpoints included, optionally
/// dropping weekends. Inverted ranges count zero days.
pub fn working_days(from: NaiveDate, to: NaiveDate, exclude_weekends: bool) -> u32 {
    let mut days = 0;
    let mut day = from;
    while day <= to {
        if !exclude_weekends || !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            days += 1;
        }
        match day.checked_add_days(Days::new(1)) {
            Some(next) => day = next,
            None => break,
        }
    }
    days
}

/// Compute utilization over a record set for the given range.
pub fn calculate_utilization(
    records: &[TimeRecord],
    params: &UtilizationParams,
) -> UtilizationReport {
    let days = working_days(params.from, params.to, params.exclude_weekends);
    let mut warnings = Vec::new();
    if days == 0 {
        warnings.push(format!(
            "No working days between {} and {}; capacity is 0",
            params.from, params.to
        ));
    }

    let refs: Vec<&TimeRecord> = records.iter().collect();
    let total_users = params
        .active_users
        .unwrap_or_else(|| distinct_users(&refs));
    let totals = utilization_metrics(&refs, days, params.capacity_hours_per_day, total_users);

    let groups = build_tree(
        &refs,
        &params.dimensions,
        &|_, _, group| {
            utilization_metrics(group, days, params.capacity_hours_per_day, distinct_users(group))
        },
        &|metrics| metrics.total_hours,
    );

    UtilizationReport {
        working_days: days,
        totals,
        groups,
        warnings,
    }
}

fn distinct_users(records: &[&TimeRecord]) -> usize {
    records
        .iter()
        .map(|r| r.user_id)
        .collect::<HashSet<_>>()
        .len()
}

fn utilization_metrics(
    group: &[&TimeRecord],
    days: u32,
    hours_per_day: f64,
    users: usize,
) -> UtilizationMetrics {
    let total_hours: f64 = group.iter().map(|r| r.hours).sum();
    let billable_hours: f64 = group.iter().filter(|r| r.billable).map(|r| r.hours).sum();
    let capacity_hours = days as f64 * hours_per_day * users as f64;

    let utilization_pct = if capacity_hours > 0.0 {
        total_hours / capacity_hours * 100.0
    } else {
        0.0
    };
    let billable_utilization_pct = if capacity_hours > 0.0 {
        billable_hours / capacity_hours * 100.0
    } else {
        0.0
    };
    let billable_ratio_pct = if total_hours > 0.0 {
        billable_hours / total_hours * 100.0
    } else {
        0.0
    };

    UtilizationMetrics {
        total_hours: round2(total_hours),
        billable_hours: round2(billable_hours),
        capacity_hours: round2(capacity_hours),
        utilization_pct: round2(utilization_pct),
        billable_utilization_pct: round2(billable_utilization_pct),
        billable_ratio_pct: round2(billable_ratio_pct),
        active_users: users,
        entry_count: group.len(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::test_support::record;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_working_days_excludes_weekends() {
        // Mon 2024-03-04 through Sun 2024-03-10: five weekdays.
        assert_eq!(working_days(date(2024, 3, 4), date(2024, 3, 10), true), 5);
        // Single Saturday.
        assert_eq!(working_days(date(2024, 3, 9), date(2024, 3, 9), true), 0);
        // Inclusive single weekday.
        assert_eq!(working_days(date(2024, 3, 4), date(2024, 3, 4), true), 1);
        // Inverted range.
        assert_eq!(working_days(date(2024, 3, 10), date(2024, 3, 4), true), 0);
    }

    #[test]
    fn test_working_days_can_count_all_days() {
        // Same Mon-Sun range with weekends kept: seven days.
        assert_eq!(working_days(date(2024, 3, 4), date(2024, 3, 10), false), 7);
        assert_eq!(working_days(date(2024, 3, 9), date(2024, 3, 9), false), 1);
    }

    #[test]
    fn test_all_days_capacity() {
        // 7 days * 8h = 56h capacity; 28h logged -> 50%.
        let mut r = record(1);
        r.hours = 28.0;
        let mut params = UtilizationParams::new(date(2024, 3, 4), date(2024, 3, 10));
        params.exclude_weekends = false;
        let report = calculate_utilization(&[r], &params);

        assert_eq!(report.working_days, 7);
        assert_eq!(report.totals.capacity_hours, 56.0);
        assert_eq!(report.totals.utilization_pct, 50.0);
    }

    #[test]
    fn test_one_user_one_week() {
        // 5 working days * 8h = 40h capacity; 30h logged -> 75%.
        let mut r = record(1);
        r.hours = 30.0;
        let params = UtilizationParams::new(date(2024, 3, 4), date(2024, 3, 8));
        let report = calculate_utilization(&[r], &params);

        assert_eq!(report.working_days, 5);
        assert_eq!(report.totals.capacity_hours, 40.0);
        assert_eq!(report.totals.utilization_pct, 75.0);
        assert_eq!(report.totals.billable_utilization_pct, 75.0);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_active_users_override() {
        let mut r = record(1);
        r.hours = 30.0;
        let mut params = UtilizationParams::new(date(2024, 3, 4), date(2024, 3, 8));
        params.active_users = Some(2);
        let report = calculate_utilization(&[r], &params);

        assert_eq!(report.totals.capacity_hours, 80.0);
        assert_eq!(report.totals.utilization_pct, 37.5);
        // Groups still use the users actually present in them.
        assert_eq!(report.groups[0].metrics.capacity_hours, 40.0);
    }

    #[test]
    fn test_billable_split() {
        let mut a = record(1);
        a.hours = 10.0;
        let mut b = record(2);
        b.hours = 10.0;
        b.billable = false;
        let params = UtilizationParams::new(date(2024, 3, 4), date(2024, 3, 8));
        let report = calculate_utilization(&[a, b], &params);

        assert_eq!(report.totals.total_hours, 20.0);
        assert_eq!(report.totals.billable_hours, 10.0);
        assert_eq!(report.totals.utilization_pct, 50.0);
        assert_eq!(report.totals.billable_utilization_pct, 25.0);
        assert_eq!(report.totals.billable_ratio_pct, 50.0);
    }

    #[test]
    fn test_zero_capacity_range_warns() {
        let r = record(1);
        // Weekend-only range.
        let params = UtilizationParams::new(date(2024, 3, 9), date(2024, 3, 10));
        let report = calculate_utilization(&[r], &params);

        assert_eq!(report.totals.capacity_hours, 0.0);
        assert_eq!(report.totals.utilization_pct, 0.0);
        assert_eq!(report.warnings.len(), 1);
    }
}
