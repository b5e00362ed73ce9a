//! Profitability calculator
//!
//! Revenue under one of three models (time-based, invoice-based, hybrid)
//! against resolved costs, grouped along the requested dimensions. Data
//! quality problems (missing rates, empty invoice sets, mixed hybrid
//! splits) surface as warnings, never as failures.

use crate::grouping::{build_tree, round2, Dimension, GroupNode};
use crate::rates::RateResolver;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tally_core::{Invoice, RateInfo, RateOverrides, RecordId, TimeRecord};

/// Alternative formulas for computing billable revenue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevenueMode {
    /// Σ(billable hours × billable rate).
    TimeBased,
    /// Σ(non-draft invoice amounts).
    InvoiceBased,
    /// Invoiced amounts plus time revenue for records not yet billed.
    Hybrid,
}

/// Profitability query parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitabilityParams {
    pub mode: RevenueMode,
    /// Whether non-billable hours contribute to cost.
    pub include_non_billable: bool,
    pub dimensions: Vec<Dimension>,
}

impl Default for ProfitabilityParams {
    fn default() -> Self {
        Self {
            mode: RevenueMode::TimeBased,
            include_non_billable: false,
            dimensions: vec![Dimension::Client],
        }
    }
}

/// Metrics for one group (or the report totals). All values rounded to 2
/// decimal places; ratios are zero-safe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfitMetrics {
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
    pub margin_pct: f64,
    pub effective_rate: f64,
    pub cost_rate_avg: f64,
    pub total_hours: f64,
    pub billable_hours: f64,
    pub entry_count: usize,
}

/// Full profitability report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitabilityReport {
    pub totals: ProfitMetrics,
    pub groups: Vec<GroupNode<ProfitMetrics>>,
    pub warnings: Vec<String>,
}

/// Compute profitability over a record set and the invoices in range.
pub fn calculate_profitability(
    records: &[TimeRecord],
    invoices: &[Invoice],
    overrides: &RateOverrides,
    params: &ProfitabilityParams,
) -> ProfitabilityReport {
    let mut resolver = RateResolver::new(overrides.clone());
    let rates = resolver.resolve_all(records);
    let mut warnings = resolver.warnings();

    let refs: Vec<&TimeRecord> = records.iter().collect();
    let invoice_refs: Vec<&Invoice> = invoices.iter().collect();
    let totals = profit_metrics(&refs, Some(&invoice_refs), params, &rates);

    if params.mode != RevenueMode::TimeBased {
        if !invoices.iter().any(|i| i.state.counts_as_revenue()) {
            warnings.push("No non-draft invoices in range; invoice revenue is 0".to_string());
        }
        for dimension in &params.dimensions {
            if !invoice_attributable(*dimension) {
                warnings.push(format!(
                    "Invoice revenue cannot be attributed by {:?}; those groups use time-based revenue",
                    dimension
                ));
            }
        }
    }
    if params.mode == RevenueMode::Hybrid {
        let billed = records.iter().filter(|r| r.billable && r.billed).count();
        let unbilled = records.iter().filter(|r| r.billable && !r.billed).count();
        if billed > 0 && unbilled > 0 {
            warnings.push(format!(
                "Hybrid revenue splits across {} billed and {} unbilled records",
                billed, unbilled
            ));
        }
    }

    let groups = build_tree(
        &refs,
        &params.dimensions,
        &|dimension, key, group| {
            let subset = invoices_for(dimension, key, invoices);
            profit_metrics(group, subset.as_deref(), params, &rates)
        },
        &|metrics| metrics.revenue,
    );

    ProfitabilityReport {
        totals,
        groups,
        warnings,
    }
}

fn invoice_attributable(dimension: Dimension) -> bool {
    matches!(dimension, Dimension::Client | Dimension::Project)
}

/// Invoices belonging to one group, when the dimension carries an invoice
/// key. `None` means the group must fall back to time-based revenue.
fn invoices_for<'a>(
    dimension: Dimension,
    key: &str,
    invoices: &'a [Invoice],
) -> Option<Vec<&'a Invoice>> {
    match dimension {
        Dimension::Client => Some(
            invoices
                .iter()
                .filter(|i| i.client_id.to_string() == key)
                .collect(),
        ),
        Dimension::Project => Some(
            invoices
                .iter()
                .filter(|i| i.project_id.is_some_and(|p| p.to_string() == key))
                .collect(),
        ),
        _ => None,
    }
}

fn profit_metrics(
    group: &[&TimeRecord],
    invoices: Option<&[&Invoice]>,
    params: &ProfitabilityParams,
    rates: &HashMap<RecordId, RateInfo>,
) -> ProfitMetrics {
    let total_hours: f64 = group.iter().map(|r| r.hours).sum();
    let billable_hours: f64 = group.iter().filter(|r| r.billable).map(|r| r.hours).sum();

    let time_revenue: f64 = group
        .iter()
        .filter(|r| r.billable)
        .map(|r| r.hours * r.billable_rate.unwrap_or(0.0))
        .sum();
    let unbilled_revenue: f64 = group
        .iter()
        .filter(|r| r.billable && !r.billed)
        .map(|r| r.hours * r.billable_rate.unwrap_or(0.0))
        .sum();
    let invoice_revenue = invoices.map(|subset| {
        subset
            .iter()
            .filter(|i| i.state.counts_as_revenue())
            .map(|i| i.amount)
            .sum::<f64>()
    });

    let revenue = match params.mode {
        RevenueMode::TimeBased => time_revenue,
        RevenueMode::InvoiceBased => invoice_revenue.unwrap_or(time_revenue),
        RevenueMode::Hybrid => invoice_revenue
            .map(|invoiced| invoiced + unbilled_revenue)
            .unwrap_or(time_revenue),
    };

    let cost: f64 = group
        .iter()
        .filter(|r| r.billable || params.include_non_billable)
        .map(|r| {
            let rate = rates.get(&r.id).map(|info| info.rate).unwrap_or(0.0);
            r.hours * rate
        })
        .sum();

    let profit = revenue - cost;
    let margin_pct = if revenue > 0.0 {
        profit / revenue * 100.0
    } else {
        0.0
    };
    let effective_rate = if billable_hours > 0.0 {
        revenue / billable_hours
    } else {
        0.0
    };
    let cost_rate_avg = if total_hours > 0.0 {
        cost / total_hours
    } else {
        0.0
    };

    ProfitMetrics {
        revenue: round2(revenue),
        cost: round2(cost),
        profit: round2(profit),
        margin_pct: round2(margin_pct),
        effective_rate: round2(effective_rate),
        cost_rate_avg: round2(cost_rate_avg),
        total_hours: round2(total_hours),
        billable_hours: round2(billable_hours),
        entry_count: group.len(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
