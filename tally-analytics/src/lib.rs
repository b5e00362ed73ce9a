//! TALLY Analytics - deterministic reporting over time-tracking data
//!
//! Four calculators (profitability, utilization, time aggregation, budget
//! performance) over a shared multi-dimension grouping primitive. All
//! computation is pure and in-memory: fetch helpers pull records through
//! the gateway once, then every report derives from the same snapshot so
//! numbers agree across reports. Data-quality issues surface as warnings
//! on the report, never as errors.

pub mod budget;
pub mod fetch;
pub mod grouping;
pub mod profitability;
pub mod rates;
pub mod time_report;
pub mod utilization;

pub use budget::{
    calculate_budget_performance, BudgetParams, BudgetRating, BudgetReport, BudgetRow,
};
pub use fetch::{fetch_invoices, fetch_time_records, TimeRecordFilters, UsageMeta};
pub use grouping::{build_tree, round2, Dimension, GroupNode};
pub use profitability::{
    calculate_profitability, ProfitMetrics, ProfitabilityParams, ProfitabilityReport, RevenueMode,
};
pub use rates::RateResolver;
pub use time_report::{calculate_time_report, TimeMetrics, TimeReport, TimeReportParams};
pub use utilization::{
    calculate_utilization, working_days, UtilizationMetrics, UtilizationParams, UtilizationReport,
};
