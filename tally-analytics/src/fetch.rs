//! Upstream fetch helpers
//!
//! Pull time records and invoices for a date range through the gateway's
//! auto-pagination, decoding the upstream's nested JSON into core
//! entities. Malformed items are skipped with a debug log rather than
//! failing the batch. Every fetch reports how much API budget it spent.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tally_core::{Invoice, InvoiceState, TallyResult, TimeRecord};
use tally_gateway::{auto_paginate_with, ApiGateway, HttpMethod, PageEnvelope, PaginateOptions};

/// Optional upstream-side filters for a time record fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeRecordFilters {
    pub client_id: Option<i64>,
    pub project_id: Option<i64>,
    pub user_id: Option<i64>,
}

/// API budget spent by one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageMeta {
    /// HTTP calls actually sent (cache hits excluded).
    pub api_calls: u64,
    pub pages_fetched: u32,
    /// Entry count reported by the upstream.
    pub total_entries: u64,
}

/// Fetch all time records in `[from, to]`, walking every page.
pub async fn fetch_time_records(
    gateway: &ApiGateway,
    from: NaiveDate,
    to: NaiveDate,
    filters: &TimeRecordFilters,
) -> TallyResult<(Vec<TimeRecord>, UsageMeta)> {
    let calls_before = gateway.calls_made();
    let paginated = auto_paginate_with(
        PaginateOptions::default(),
        |page, per_page| async move {
            let mut params = vec![
                ("from".to_string(), from.to_string()),
                ("to".to_string(), to.to_string()),
                ("page".to_string(), page.to_string()),
                ("per_page".to_string(), per_page.to_string()),
            ];
            if let Some(client_id) = filters.client_id {
                params.push(("client_id".to_string(), client_id.to_string()));
            }
            if let Some(project_id) = filters.project_id {
                params.push(("project_id".to_string(), project_id.to_string()));
            }
            if let Some(user_id) = filters.user_id {
                params.push(("user_id".to_string(), user_id.to_string()));
            }
            let body = gateway
                .request(HttpMethod::Get, "/time_entries", None, &params)
                .await?;
            PageEnvelope::<Value>::parse(&body, "time_entries")
        },
        |page, count| tracing::debug!(page, count, "Fetched time entry page"),
    )
    .await?;

    let records: Vec<TimeRecord> = paginated
        .items
        .iter()
        .filter_map(parse_time_record)
        .collect();
    let skipped = paginated.items.len() - records.len();
    if skipped > 0 {
        tracing::debug!(skipped, "Skipped malformed time entries");
    }

    Ok((
        records,
        UsageMeta {
            api_calls: gateway.calls_made() - calls_before,
            pages_fetched: paginated.pages_fetched,
            total_entries: paginated.total_entries,
        },
    ))
}

/// Fetch all invoices issued in `[from, to]`.
pub async fn fetch_invoices(
    gateway: &ApiGateway,
    from: NaiveDate,
    to: NaiveDate,
) -> TallyResult<(Vec<Invoice>, UsageMeta)> {
    let calls_before = gateway.calls_made();
    let paginated = auto_paginate_with(
        PaginateOptions::default(),
        |page, per_page| async move {
            let params = vec![
                ("from".to_string(), from.to_string()),
                ("to".to_string(), to.to_string()),
                ("page".to_string(), page.to_string()),
                ("per_page".to_string(), per_page.to_string()),
            ];
            let body = gateway
                .request(HttpMethod::Get, "/invoices", None, &params)
                .await?;
            PageEnvelope::<Value>::parse(&body, "invoices")
        },
        |page, count| tracing::debug!(page, count, "Fetched invoice page"),
    )
    .await?;

    let invoices: Vec<Invoice> = paginated.items.iter().filter_map(parse_invoice).collect();
    let skipped = paginated.items.len() - invoices.len();
    if skipped > 0 {
        tracing::debug!(skipped, "Skipped malformed invoices");
    }

    Ok((
        invoices,
        UsageMeta {
            api_calls: gateway.calls_made() - calls_before,
            pages_fetched: paginated.pages_fetched,
            total_entries: paginated.total_entries,
        },
    ))
}

fn nested_id(item: &Value, field: &str) -> Option<i64> {
    item.get(field)?.get("id")?.as_i64()
}

fn nested_name(item: &Value, field: &str) -> String {
    item.get(field)
        .and_then(|v| v.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Decode one upstream time entry. Entries missing an id, a date, or any
/// of the four parent references are skipped.
fn parse_time_record(item: &Value) -> Option<TimeRecord> {
    let spent_date = item
        .get("spent_date")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())?;

    Some(TimeRecord {
        id: item.get("id").and_then(Value::as_i64)?,
        spent_date,
        hours: item.get("hours").and_then(Value::as_f64).unwrap_or(0.0),
        rounded_hours: item
            .get("rounded_hours")
            .and_then(Value::as_f64)
            .or_else(|| item.get("hours").and_then(Value::as_f64))
            .unwrap_or(0.0),
        billable: item
            .get("billable")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        billable_rate: item.get("billable_rate").and_then(Value::as_f64),
        cost_rate: item.get("cost_rate").and_then(Value::as_f64),
        billed: item
            .get("is_billed")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        user_id: nested_id(item, "user")?,
        user_name: nested_name(item, "user"),
        client_id: nested_id(item, "client")?,
        client_name: nested_name(item, "client"),
        project_id: nested_id(item, "project")?,
        project_name: nested_name(item, "project"),
        task_id: nested_id(item, "task")?,
        task_name: nested_name(item, "task"),
    })
}

/// Decode one upstream invoice. The project reference is optional; the
/// client reference is not.
fn parse_invoice(item: &Value) -> Option<Invoice> {
    let state = match item.get("state").and_then(Value::as_str)? {
        "draft" => InvoiceState::Draft,
        "open" => InvoiceState::Open,
        "paid" => InvoiceState::Paid,
        "closed" => InvoiceState::Closed,
        _ => return None,
    };
    let issue_date = item
        .get("issue_date")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())?;

    Some(Invoice {
        id: item.get("id").and_then(Value::as_i64)?,
        client_id: nested_id(item, "client")?,
        project_id: nested_id(item, "project"),
        amount: item.get("amount").and_then(Value::as_f64).unwrap_or(0.0),
        state,
        issue_date,
    })
}

// =============================================================================
// TESTS
// =============================================================================
