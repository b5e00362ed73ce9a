//! Core entity structures
//!
//! Normalized shapes for upstream time-tracking records, directory entries,
//! resolution results, and rate provenance. Per-request values: created from
//! a fetch, consumed by one computation, then discarded.

use crate::RecordId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Kind of a directory record the resolver can match against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Client,
    Project,
    User,
    Task,
}

impl EntityKind {
    /// All kinds, in the order directory snapshots are fetched.
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Client,
        EntityKind::Project,
        EntityKind::User,
        EntityKind::Task,
    ];

    /// Upstream collection path for this kind.
    pub fn path(&self) -> &'static str {
        match self {
            EntityKind::Client => "/clients",
            EntityKind::Project => "/projects",
            EntityKind::User => "/users",
            EntityKind::Task => "/tasks",
        }
    }

    /// Array-valued payload field in the upstream list envelope.
    pub fn items_field(&self) -> &'static str {
        match self {
            EntityKind::Client => "clients",
            EntityKind::Project => "projects",
            EntityKind::User => "users",
            EntityKind::Task => "tasks",
        }
    }
}

/// One record in the resolver's directory snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub kind: EntityKind,
    pub id: RecordId,
    pub name: String,
    /// Owning entity, when the upstream nests one (e.g. a project's client).
    pub parent_id: Option<RecordId>,
    pub parent_name: Option<String>,
    pub active: bool,
}

/// How a resolved entity matched the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Normalized,
    Partial,
    Fuzzy,
}

/// A canonical record matched from a free-text name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEntity {
    pub kind: EntityKind,
    pub id: RecordId,
    pub name: String,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub match_kind: MatchKind,
    pub parent_id: Option<RecordId>,
    pub parent_name: Option<String>,
}

/// Normalized time-tracking line. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeRecord {
    pub id: RecordId,
    pub spent_date: NaiveDate,
    pub hours: f64,
    pub rounded_hours: f64,
    pub billable: bool,
    /// Client-facing price per hour, when the upstream assigned one.
    pub billable_rate: Option<f64>,
    /// Internal cost per hour, when the upstream assigned one.
    pub cost_rate: Option<f64>,
    /// Whether this line has already appeared on an invoice.
    pub billed: bool,
    pub user_id: RecordId,
    pub user_name: String,
    pub client_id: RecordId,
    pub client_name: String,
    pub project_id: RecordId,
    pub project_name: String,
    pub task_id: RecordId,
    pub task_name: String,
}

/// Lifecycle state of an upstream invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceState {
    Draft,
    Open,
    Paid,
    Closed,
}

impl InvoiceState {
    /// Draft invoices never count as revenue.
    pub fn counts_as_revenue(&self) -> bool {
        !matches!(self, InvoiceState::Draft)
    }
}

/// An upstream invoice used by invoice-based revenue modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: RecordId,
    pub client_id: RecordId,
    pub project_id: Option<RecordId>,
    pub amount: f64,
    pub state: InvoiceState,
    pub issue_date: NaiveDate,
}

/// Where a resolved cost rate came from. Provenance is part of the value:
/// downstream warnings depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    /// The record carried its own rate.
    Upstream,
    /// Matched in the local rate-override file.
    ConfigFile,
    /// Environment-supplied or configured default.
    EnvDefault,
    /// Nothing matched; rate is zero and a warning was recorded.
    FallbackZero,
}

/// A cost rate with its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateInfo {
    pub rate: f64,
    pub source: RateSource,
}

/// Hour budget assigned to one (user, project) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAssignment {
    pub user_id: RecordId,
    pub project_id: RecordId,
    pub budget_hours: Option<f64>,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_paths_match_items_fields() {
        for kind in EntityKind::ALL {
            // "/clients" <-> "clients"
            assert_eq!(&kind.path()[1..], kind.items_field());
        }
    }

    #[test]
    fn test_invoice_state_revenue_eligibility() {
        assert!(!InvoiceState::Draft.counts_as_revenue());
        assert!(InvoiceState::Open.counts_as_revenue());
        assert!(InvoiceState::Paid.counts_as_revenue());
        assert!(InvoiceState::Closed.counts_as_revenue());
    }

    #[test]
    fn test_match_kind_serializes_snake_case() {
        let json = serde_json::to_string(&MatchKind::Normalized).unwrap();
        assert_eq!(json, "\"normalized\"");
    }

    #[test]
    fn test_rate_source_roundtrip() {
        let info = RateInfo {
            rate: 75.0,
            source: RateSource::ConfigFile,
        };
        let json = serde_json::to_string(&info).unwrap();
        let back: RateInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
        assert!(json.contains("config_file"));
    }
}
