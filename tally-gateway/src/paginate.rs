//! Generic auto-pagination
//!
//! Walks `page`/`per_page` result sets strictly sequentially: each page
//! consumes one rate-limiter permit and ordering must be preserved for
//! deterministic bookkeeping. All-or-nothing semantics: any page failure
//! fails the whole call and partially accumulated items are discarded.
//!
//! The call site designates the array-valued payload field explicitly via
//! [`PageEnvelope::parse`]; nothing here sniffs response shapes.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use tally_core::constants::{DEFAULT_MAX_PAGES, DEFAULT_PER_PAGE};
use tally_core::{GatewayError, TallyResult};

/// Bounds on one pagination walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginateOptions {
    /// Circuit breaker: pages never walked past this count.
    pub max_pages: u32,
    /// Page size passed to the fetch closure.
    pub per_page: u32,
}

impl Default for PaginateOptions {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// One page of an upstream paginated response.
#[derive(Debug, Clone, PartialEq)]
pub struct PageEnvelope<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub total_pages: u32,
    pub total_entries: u64,
    pub next_page: Option<u32>,
}

impl<T: DeserializeOwned> PageEnvelope<T> {
    /// Extract a page from an upstream body. `items_field` names the
    /// array-valued payload field for this endpoint.
    pub fn parse(body: &Value, items_field: &str) -> TallyResult<Self> {
        let items_value = body.get(items_field).ok_or_else(|| {
            GatewayError::InvalidResponse {
                reason: format!("Response missing `{}` field", items_field),
            }
        })?;
        let items: Vec<T> = serde_json::from_value(items_value.clone()).map_err(|e| {
            GatewayError::InvalidResponse {
                reason: format!("Cannot decode `{}` items: {}", items_field, e),
            }
        })?;

        let page = read_u64(body, "page").unwrap_or(1) as u32;
        let total_pages = read_u64(body, "total_pages").unwrap_or(1) as u32;
        let total_entries = read_u64(body, "total_entries").unwrap_or(items.len() as u64);
        let next_page = read_u64(body, "next_page").map(|n| n as u32);

        Ok(Self {
            items,
            page,
            total_pages,
            total_entries,
            next_page,
        })
    }
}

fn read_u64(body: &Value, field: &str) -> Option<u64> {
    body.get(field).and_then(Value::as_u64)
}

/// Accumulated result of a pagination walk.
#[derive(Debug, Clone, PartialEq)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    /// Entry count reported by the upstream, not necessarily `items.len()`
    /// when the page cap truncated the walk.
    pub total_entries: u64,
    pub pages_fetched: u32,
}

/// Walk pages until exhaustion or the page cap.
///
/// `fetch` is called with `(page, per_page)` starting at page 1 and must
/// return the parsed envelope for that page. The loop stops when the
/// upstream reports no next page, when the next page exceeds `total_pages`,
/// or when the `max_pages` circuit breaker trips.
pub async fn auto_paginate<T, F, Fut>(
    options: PaginateOptions,
    fetch: F,
) -> TallyResult<Paginated<T>>
where
    F: FnMut(u32, u32) -> Fut,
    Fut: Future<Output = TallyResult<PageEnvelope<T>>>,
{
    auto_paginate_with(options, fetch, |_, _| {}).await
}

/// [`auto_paginate`] with a per-page progress hook.
///
/// `on_page` fires after each successful fetch with `(page, item_count)`,
/// in walk order. It never fires for a failed page.
pub async fn auto_paginate_with<T, F, Fut, P>(
    options: PaginateOptions,
    mut fetch: F,
    mut on_page: P,
) -> TallyResult<Paginated<T>>
where
    F: FnMut(u32, u32) -> Fut,
    Fut: Future<Output = TallyResult<PageEnvelope<T>>>,
    P: FnMut(u32, usize),
{
    let mut items = Vec::new();
    let mut total_entries = 0u64;
    let mut pages_fetched = 0u32;
    let mut page = 1u32;

    loop {
        if page > options.max_pages {
            tracing::debug!(max_pages = options.max_pages, "Pagination page cap reached");
            break;
        }

        let envelope = fetch(page, options.per_page).await.map_err(|e| {
            GatewayError::PaginationFailed {
                page,
                reason: e.to_string(),
            }
        })?;

        pages_fetched += 1;
        total_entries = envelope.total_entries;
        on_page(page, envelope.items.len());
        items.extend(envelope.items);

        match envelope.next_page {
            None => break,
            Some(next) if next > envelope.total_pages => break,
            Some(next) => page = next,
        }
    }

    Ok(Paginated {
        items,
        total_entries,
        pages_fetched,
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tally_core::TallyError;

    /// Fake upstream: `total` items served in pages of `per_page`.
    fn fake_page(page: u32, per_page: u32, total: u64) -> PageEnvelope<u64> {
        let total_pages = ((total + per_page as u64 - 1) / per_page as u64) as u32;
        let start = (page as u64 - 1) * per_page as u64;
        let end = (start + per_page as u64).min(total);
        PageEnvelope {
            items: (start..end).collect(),
            page,
            total_pages,
            total_entries: total,
            next_page: (page < total_pages).then(|| page + 1),
        }
    }

    #[tokio::test]
    async fn test_walks_all_pages() {
        let result = auto_paginate(
            PaginateOptions {
                max_pages: 10,
                per_page: 100,
            },
            |page, per_page| async move { Ok(fake_page(page, per_page, 250)) },
        )
        .await
        .unwrap();

        assert_eq!(result.items.len(), 250);
        assert_eq!(result.total_entries, 250);
        assert_eq!(result.pages_fetched, 3);
        // Strictly sequential accumulation.
        assert_eq!(result.items[0], 0);
        assert_eq!(result.items[249], 249);
    }

    #[tokio::test]
    async fn test_page_hook_fires_per_page_in_order() {
        let mut seen: Vec<(u32, usize)> = Vec::new();
        let result = auto_paginate_with(
            PaginateOptions {
                max_pages: 10,
                per_page: 100,
            },
            |page, per_page| async move { Ok(fake_page(page, per_page, 250)) },
            |page, count| seen.push((page, count)),
        )
        .await
        .unwrap();

        assert_eq!(result.pages_fetched, 3);
        assert_eq!(seen, vec![(1, 100), (2, 100), (3, 50)]);
    }

    #[tokio::test]
    async fn test_page_hook_silent_on_failed_page() {
        let mut seen: Vec<u32> = Vec::new();
        let result: TallyResult<Paginated<u64>> = auto_paginate_with(
            PaginateOptions {
                max_pages: 10,
                per_page: 100,
            },
            |page, per_page| async move {
                if page == 2 {
                    Err(GatewayError::RequestFailed {
                        status: 500,
                        message: "boom".to_string(),
                    }
                    .into())
                } else {
                    Ok(fake_page(page, per_page, 250))
                }
            },
            |page, _| seen.push(page),
        )
        .await;

        assert!(result.is_err());
        // Only the successful first page reported.
        assert_eq!(seen, vec![1]);
    }

    #[tokio::test]
    async fn test_page_cap_truncates() {
        let result = auto_paginate(
            PaginateOptions {
                max_pages: 2,
                per_page: 100,
            },
            |page, per_page| async move { Ok(fake_page(page, per_page, 250)) },
        )
        .await
        .unwrap();

        assert_eq!(result.items.len(), 200);
        assert_eq!(result.pages_fetched, 2);
        assert_eq!(result.total_entries, 250);
    }

    #[tokio::test]
    async fn test_single_page_stops_on_null_next() {
        let result = auto_paginate(
            PaginateOptions::default(),
            |page, per_page| async move { Ok(fake_page(page, per_page, 40)) },
        )
        .await
        .unwrap();

        assert_eq!(result.items.len(), 40);
        assert_eq!(result.pages_fetched, 1);
    }

    #[tokio::test]
    async fn test_mid_walk_failure_is_all_or_nothing() {
        let result: TallyResult<Paginated<u64>> = auto_paginate(
            PaginateOptions {
                max_pages: 10,
                per_page: 100,
            },
            |page, per_page| async move {
                if page == 2 {
                    Err(GatewayError::RequestFailed {
                        status: 500,
                        message: "boom".to_string(),
                    }
                    .into())
                } else {
                    Ok(fake_page(page, per_page, 250))
                }
            },
        )
        .await;

        let err = result.unwrap_err();
        assert!(matches!(
            err,
            TallyError::Gateway(GatewayError::PaginationFailed { page: 2, .. })
        ));
    }

    #[test]
    fn test_envelope_parse_designated_field() {
        let body = json!({
            "clients": [{"id": 1, "name": "Acme"}],
            "page": 1,
            "total_pages": 4,
            "total_entries": 350,
            "next_page": 2,
        });
        let envelope: PageEnvelope<Value> = PageEnvelope::parse(&body, "clients").unwrap();
        assert_eq!(envelope.items.len(), 1);
        assert_eq!(envelope.total_pages, 4);
        assert_eq!(envelope.total_entries, 350);
        assert_eq!(envelope.next_page, Some(2));
    }

    #[test]
    fn test_envelope_parse_missing_field_is_error() {
        let body = json!({"projects": []});
        let err = PageEnvelope::<Value>::parse(&body, "clients").unwrap_err();
        assert!(matches!(
            err,
            TallyError::Gateway(GatewayError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_envelope_parse_null_next_page() {
        let body = json!({
            "tasks": [],
            "page": 3,
            "total_pages": 3,
            "total_entries": 210,
            "next_page": null,
        });
        let envelope: PageEnvelope<Value> = PageEnvelope::parse(&body, "tasks").unwrap();
        assert_eq!(envelope.next_page, None);
    }
}
