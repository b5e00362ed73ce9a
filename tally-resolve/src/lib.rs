//! TALLY Resolve - fuzzy entity resolution
//!
//! Maps free-text names to canonical directory records with confidence
//! scoring. The directory snapshot (clients, projects, users, tasks) is
//! fetched through the gateway's auto-pagination and refreshed when older
//! than its TTL; the `cached` flag in every response lets callers reason
//! about staleness.

pub mod matching;

pub use matching::{normalize_name, score_match};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tally_core::constants::{
    DEFAULT_MIN_CONFIDENCE, DEFAULT_RESOLVE_LIMIT, DEFAULT_SNAPSHOT_TTL_SECS,
};
use tally_core::{DirectoryEntry, EntityKind, ResolveError, ResolvedEntity, TallyResult};
use tally_gateway::{auto_paginate, ApiGateway, HttpMethod, PageEnvelope, PaginateOptions};
use tokio::sync::RwLock;

/// One resolution query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub query: String,
    /// Kinds to search; all four when absent.
    pub kinds: Option<Vec<EntityKind>>,
    pub min_confidence: f64,
    /// Per-kind result cap.
    pub limit: usize,
}

impl ResolveRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            kinds: None,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            limit: DEFAULT_RESOLVE_LIMIT,
        }
    }
}

/// Resolution results plus staleness metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveResponse {
    /// Confidence-descending, capped per kind.
    pub results: Vec<ResolvedEntity>,
    /// Matches above the confidence floor before capping.
    pub total_matches: usize,
    /// Whether the directory snapshot was served from memory.
    pub cached: bool,
    pub searched_kinds: Vec<EntityKind>,
}

#[derive(Debug)]
struct DirectorySnapshot {
    entries: Vec<DirectoryEntry>,
    fetched_at: Instant,
}

/// Fuzzy name resolver over a periodically refreshed directory snapshot.
pub struct EntityResolver {
    gateway: Arc<ApiGateway>,
    snapshot: RwLock<Option<DirectorySnapshot>>,
    snapshot_ttl: Duration,
}

impl EntityResolver {
    pub fn new(gateway: Arc<ApiGateway>) -> Self {
        Self::with_snapshot_ttl(gateway, Duration::from_secs(DEFAULT_SNAPSHOT_TTL_SECS))
    }

    pub fn with_snapshot_ttl(gateway: Arc<ApiGateway>, snapshot_ttl: Duration) -> Self {
        Self {
            gateway,
            snapshot: RwLock::new(None),
            snapshot_ttl,
        }
    }

    /// Resolve a free-text name against the directory.
    pub async fn resolve(&self, request: ResolveRequest) -> TallyResult<ResolveResponse> {
        if request.query.trim().is_empty() {
            return Err(ResolveError::EmptyQuery.into());
        }

        let kinds = request
            .kinds
            .clone()
            .unwrap_or_else(|| EntityKind::ALL.to_vec());
        let (entries, cached) = self.snapshot_entries().await?;

        let mut matches: Vec<ResolvedEntity> = entries
            .iter()
            .filter(|entry| kinds.contains(&entry.kind))
            .filter_map(|entry| {
                let (confidence, match_kind) = score_match(&request.query, &entry.name);
                (confidence >= request.min_confidence).then(|| ResolvedEntity {
                    kind: entry.kind,
                    id: entry.id,
                    name: entry.name.clone(),
                    confidence,
                    match_kind,
                    parent_id: entry.parent_id,
                    parent_name: entry.parent_name.clone(),
                })
            })
            .collect();

        let total_matches = matches.len();
        matches.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });

        // Cap per kind, preserving the confidence ordering.
        let mut taken: HashMap<EntityKind, usize> = HashMap::new();
        let results: Vec<ResolvedEntity> = matches
            .into_iter()
            .filter(|entity| {
                let count = taken.entry(entity.kind).or_insert(0);
                *count += 1;
                *count <= request.limit
            })
            .collect();

        Ok(ResolveResponse {
            results,
            total_matches,
            cached,
            searched_kinds: kinds,
        })
    }

    /// Drop the snapshot so the next resolve refreshes it.
    pub async fn invalidate_snapshot(&self) {
        *self.snapshot.write().await = None;
    }

    async fn snapshot_entries(&self) -> TallyResult<(Vec<DirectoryEntry>, bool)> {
        {
            let guard = self.snapshot.read().await;
            if let Some(snapshot) = guard.as_ref() {
                if snapshot.fetched_at.elapsed() < self.snapshot_ttl {
                    return Ok((snapshot.entries.clone(), true));
                }
            }
        }

        let mut entries = Vec::new();
        for kind in EntityKind::ALL {
            let fetched =
                self.fetch_kind(kind)
                    .await
                    .map_err(|e| ResolveError::SnapshotUnavailable {
                        reason: e.to_string(),
                    })?;
            entries.extend(fetched);
        }
        tracing::info!(entries = entries.len(), "Directory snapshot refreshed");

        let cloned = entries.clone();
        *self.snapshot.write().await = Some(DirectorySnapshot {
            entries,
            fetched_at: Instant::now(),
        });
        Ok((cloned, false))
    }

    async fn fetch_kind(&self, kind: EntityKind) -> TallyResult<Vec<DirectoryEntry>> {
        let gateway = &self.gateway;
        let paginated = auto_paginate(PaginateOptions::default(), |page, per_page| async move {
            let params = vec![
                ("page".to_string(), page.to_string()),
                ("per_page".to_string(), per_page.to_string()),
            ];
            let body = gateway
                .request(HttpMethod::Get, kind.path(), None, &params)
                .await?;
            PageEnvelope::<Value>::parse(&body, kind.items_field())
        })
        .await?;

        Ok(paginated
            .items
            .iter()
            .filter_map(|item| parse_entry(kind, item))
            .collect())
    }
}

impl std::fmt::Debug for EntityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityResolver")
            .field("snapshot_ttl", &self.snapshot_ttl)
            .finish()
    }
}

/// Decode one upstream directory item. Items missing an id or a usable
/// name are skipped rather than failing the whole snapshot.
fn parse_entry(kind: EntityKind, item: &Value) -> Option<DirectoryEntry> {
    let id = item.get("id").and_then(Value::as_i64)?;
    let name = match kind {
        EntityKind::User => {
            let first = item.get("first_name").and_then(Value::as_str);
            let last = item.get("last_name").and_then(Value::as_str);
            match (first, last) {
                (Some(first), Some(last)) => format!("{} {}", first, last),
                (Some(first), None) => first.to_string(),
                _ => item.get("name").and_then(Value::as_str)?.to_string(),
            }
        }
        _ => item.get("name").and_then(Value::as_str)?.to_string(),
    };

    let parent = item.get("client").filter(|v| v.is_object());
    let parent_id = parent.and_then(|c| c.get("id")).and_then(Value::as_i64);
    let parent_name = parent
        .and_then(|c| c.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let active = item
        .get("is_active")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    Some(DirectoryEntry {
        kind,
        id,
        name,
        parent_id,
        parent_name,
        active,
    })
}

// =============================================================================
// TESTS
// =============================================================================
