//! Budget performance calculator
//!
//! Actual hours per (user, project) against assigned budget hours. Rows
//! without an assigned budget carry no variance and rate as on-budget.
//! Variance within the tolerance band also rates as on-budget.

use crate::grouping::round2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tally_core::constants::DEFAULT_BUDGET_TOLERANCE_PCT;
use tally_core::{BudgetAssignment, RecordId, TimeRecord};

/// Budget query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetParams {
    /// Variance band (percent) still considered on-budget.
    pub tolerance_pct: f64,
}

impl Default for BudgetParams {
    fn default() -> Self {
        Self {
            tolerance_pct: DEFAULT_BUDGET_TOLERANCE_PCT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetRating {
    OverBudget,
    OnBudget,
    UnderBudget,
}

/// One (user, project) row of the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetRow {
    pub user_id: RecordId,
    pub user_name: String,
    pub project_id: RecordId,
    pub project_name: String,
    pub actual_hours: f64,
    pub budget_hours: Option<f64>,
    pub variance_hours: Option<f64>,
    pub variance_pct: Option<f64>,
    pub rating: BudgetRating,
}

/// One entry of the under-budget leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnderBudgetEntry {
    pub user_name: String,
    pub project_name: String,
    pub variance_pct: f64,
}

/// One entry of the repeat-overrun list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverrunEntry {
    pub user_name: String,
    pub over_budget_projects: usize,
}

/// Full budget performance report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetReport {
    pub rows: Vec<BudgetRow>,
    /// Top 5 rows by how far under budget they landed.
    pub top_under_budget: Vec<UnderBudgetEntry>,
    /// Top 5 users with at least two over-budget projects.
    pub repeat_overruns: Vec<OverrunEntry>,
    pub warnings: Vec<String>,
}

/// Compute budget performance over records and their budget assignments.
///
/// The report covers the union of (user, project) pairs seen in either
/// input: logged pairs without an assignment rate on-budget with no
/// variance, and assigned pairs without logged time count zero actual
/// hours.
pub fn calculate_budget_performance(
    records: &[TimeRecord],
    assignments: &[BudgetAssignment],
    params: &BudgetParams,
) -> BudgetReport {
    // BTreeMap keeps row order deterministic across runs.
    let mut pairs: BTreeMap<(RecordId, RecordId), (f64, Option<(String, String)>)> =
        BTreeMap::new();
    for record in records {
        let entry = pairs
            .entry((record.user_id, record.project_id))
            .or_insert((0.0, None));
        entry.0 += record.hours;
        if entry.1.is_none() {
            entry.1 = Some((record.user_name.clone(), record.project_name.clone()));
        }
    }

    let mut budgets: HashMap<(RecordId, RecordId), Option<f64>> = HashMap::new();
    for assignment in assignments {
        let key = (assignment.user_id, assignment.project_id);
        budgets.insert(key, assignment.budget_hours);
        pairs.entry(key).or_insert((0.0, None));
    }

    let mut warnings = Vec::new();
    let mut rows: Vec<BudgetRow> = pairs
        .into_iter()
        .map(|((user_id, project_id), (actual_hours, names))| {
            let (user_name, project_name) = names.unwrap_or_else(|| {
                (format!("user {}", user_id), format!("project {}", project_id))
            });
            let budget_hours = budgets.get(&(user_id, project_id)).copied().flatten();
            build_row(
                user_id,
                user_name,
                project_id,
                project_name,
                actual_hours,
                budget_hours,
                params.tolerance_pct,
            )
        })
        .collect();

    let without_budget = rows.iter().filter(|r| r.budget_hours.is_none()).count();
    if without_budget > 0 {
        warnings.push(format!(
            "{} user/project pairs have no budget assignment",
            without_budget
        ));
    }

    rows.sort_by(|a, b| {
        b.variance_pct
            .unwrap_or(f64::MIN)
            .partial_cmp(&a.variance_pct.unwrap_or(f64::MIN))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let top_under_budget = rows
        .iter()
        .filter(|r| r.rating == BudgetRating::UnderBudget)
        .map(|r| UnderBudgetEntry {
            user_name: r.user_name.clone(),
            project_name: r.project_name.clone(),
            variance_pct: r.variance_pct.unwrap_or(0.0),
        })
        .rev()
        .take(5)
        .collect();

    let mut overruns: HashMap<RecordId, (String, usize)> = HashMap::new();
    for row in rows.iter().filter(|r| r.rating == BudgetRating::OverBudget) {
        let entry = overruns
            .entry(row.user_id)
            .or_insert_with(|| (row.user_name.clone(), 0));
        entry.1 += 1;
    }
    let mut repeat_overruns: Vec<OverrunEntry> = overruns
        .into_values()
        .filter(|(_, count)| *count >= 2)
        .map(|(user_name, over_budget_projects)| OverrunEntry {
            user_name,
            over_budget_projects,
        })
        .collect();
    repeat_overruns.sort_by(|a, b| {
        b.over_budget_projects
            .cmp(&a.over_budget_projects)
            .then_with(|| a.user_name.cmp(&b.user_name))
    });
    repeat_overruns.truncate(5);

    BudgetReport {
        rows,
        top_under_budget,
        repeat_overruns,
        warnings,
    }
}

fn build_row(
    user_id: RecordId,
    user_name: String,
    project_id: RecordId,
    project_name: String,
    actual_hours: f64,
    budget_hours: Option<f64>,
    tolerance_pct: f64,
) -> BudgetRow {
    let variance_hours = budget_hours.map(|budget| round2(actual_hours - budget));
    let variance_pct = budget_hours.and_then(|budget| {
        if budget > 0.0 {
            Some(round2((actual_hours - budget) / budget * 100.0))
        } else {
            None
        }
    });
    let rating = match variance_pct {
        Some(pct) if pct > tolerance_pct => BudgetRating::OverBudget,
        Some(pct) if pct < -tolerance_pct => BudgetRating::UnderBudget,
        _ => BudgetRating::OnBudget,
    };

    BudgetRow {
        user_id,
        user_name,
        project_id,
        project_name,
        actual_hours: round2(actual_hours),
        budget_hours,
        variance_hours,
        variance_pct,
        rating,
    }
}

// =============================================================================
// TESTS
// =============================================================================
