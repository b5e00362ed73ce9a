//! API gateway request state machine
//!
//! Single entry point for all upstream calls. Flow per request:
//! cache check (GET only) -> acquire permit -> send -> status dispatch.
//! 429 responses set an embargo on the shared limiter and are retried up to
//! the retry budget; other non-2xx statuses are fatal immediately. Successful
//! mutations coarsely invalidate every cached GET under the same top-level
//! resource segment: over-invalidation is preferred over staleness.

use crate::cache::ResponseCache;
use crate::limiter::RateLimiter;
use crate::transport::{HttpMethod, HttpTransport, ReqwestTransport, TransportRequest};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tally_core::config::GatewayConfig;
use tally_core::constants::DEFAULT_RETRY_AFTER_SECS;
use tally_core::{GatewayError, TallyResult};

/// Rate-limited, cached gateway to the upstream API.
pub struct ApiGateway {
    transport: Arc<dyn HttpTransport>,
    limiter: Arc<RateLimiter>,
    cache: Arc<ResponseCache>,
    max_retries: u32,
    calls: AtomicU64,
}

impl ApiGateway {
    /// Compose a gateway from shared handles. The limiter and cache are
    /// process-wide: pass the same `Arc`s into every gateway instance.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        limiter: Arc<RateLimiter>,
        cache: Arc<ResponseCache>,
        max_retries: u32,
    ) -> Self {
        Self {
            transport,
            limiter,
            cache,
            max_retries: max_retries.max(1),
            calls: AtomicU64::new(0),
        }
    }

    /// Build a self-contained gateway from configuration: reqwest
    /// transport against `config.base_url` plus fresh limiter and cache
    /// handles. Use [`ApiGateway::new`] instead when several gateways
    /// must share one limiter or cache.
    pub fn from_config(config: &GatewayConfig, token: impl Into<String>) -> TallyResult<Self> {
        let transport = ReqwestTransport::new(
            config.base_url.clone(),
            token,
            config.account_id.clone(),
            config.request_timeout,
        )?;
        Ok(Self::new(
            Arc::new(transport),
            Arc::new(RateLimiter::new(config.rate_limit.clone())),
            Arc::new(ResponseCache::new(config.cache.clone())),
            config.max_retries,
        ))
    }

    /// Upstream calls issued through this gateway so far. Reported to
    /// callers as API-usage metadata; not persisted.
    pub fn calls_made(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Shared limiter handle, for status reporting.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Shared cache handle, for stats and explicit invalidation.
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Issue one logical request.
    ///
    /// GET responses are served from cache when live and written to cache on
    /// success. 204 yields `Value::Null`. 429 is retried with the upstream
    /// embargo; any other non-2xx status is returned as `RequestFailed`.
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
        params: &[(String, String)],
    ) -> TallyResult<Value> {
        let key = ResponseCache::request_key(path, params);
        if method.is_get() {
            if let Some(cached) = self.cache.get(&key) {
                tracing::debug!(path, "Cache hit");
                return Ok(cached);
            }
        }

        let request = TransportRequest {
            method,
            path: path.to_string(),
            params: params.to_vec(),
            body,
        };

        let mut last_rate_limit = GatewayError::RateLimited { retry_after_ms: 0 };
        for attempt in 1..=self.max_retries {
            let wait = self.limiter.acquire_permit();
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
            self.limiter.record_request();
            self.calls.fetch_add(1, Ordering::Relaxed);

            let response = self.transport.execute(&request).await?;
            match response.status {
                429 => {
                    let retry_after = response
                        .retry_after
                        .unwrap_or(Duration::from_secs(DEFAULT_RETRY_AFTER_SECS));
                    self.limiter.handle_rate_limit(retry_after);
                    tracing::warn!(
                        path,
                        attempt,
                        retry_after_ms = retry_after.as_millis() as u64,
                        "Upstream rate limit, retrying"
                    );
                    last_rate_limit = GatewayError::RateLimited {
                        retry_after_ms: retry_after.as_millis() as u64,
                    };
                }
                204 => {
                    self.finish_success(&method, path, &key, &Value::Null);
                    return Ok(Value::Null);
                }
                status if (200..300).contains(&status) => {
                    let value: Value = if response.body.trim().is_empty() {
                        Value::Null
                    } else {
                        serde_json::from_str(&response.body).map_err(|e| {
                            GatewayError::InvalidResponse {
                                reason: format!("Failed to parse response body: {}", e),
                            }
                        })?
                    };
                    self.finish_success(&method, path, &key, &value);
                    return Ok(value);
                }
                status => {
                    return Err(GatewayError::RequestFailed {
                        status,
                        message: truncate_body(&response.body),
                    }
                    .into());
                }
            }
        }

        tracing::error!(path, attempts = self.max_retries, "Retry budget exhausted");
        Err(GatewayError::RetriesExhausted {
            attempts: self.max_retries,
            message: last_rate_limit.to_string(),
        }
        .into())
    }

    fn finish_success(&self, method: &HttpMethod, path: &str, key: &str, value: &Value) {
        if method.is_get() {
            self.cache.set(key.to_string(), value.clone());
        } else {
            let segment = top_resource_segment(path);
            let invalidated = self.cache.invalidate(segment);
            tracing::debug!(path, segment, invalidated, "Mutation invalidated cached GETs");
        }
    }
}

impl std::fmt::Debug for ApiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiGateway")
            .field("max_retries", &self.max_retries)
            .field("calls_made", &self.calls_made())
            .finish()
    }
}

/// Top-level resource segment of a path: "/time_entries/123" -> "/time_entries".
fn top_resource_segment(path: &str) -> &str {
    let trimmed = path.trim_start_matches('/');
    match trimmed.find('/') {
        Some(idx) => &path[..path.len() - trimmed.len() + idx],
        None => path,
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 300;
    if body.len() > MAX {
        let cut = body
            .char_indices()
            .take_while(|(i, _)| *i < MAX)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}...", &body[..cut])
    } else {
        body.to_string()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use serde_json::json;
    use tally_core::config::{CacheConfig, RateLimitConfig};
    use tally_core::TallyError;

    fn gateway(mock: Arc<MockTransport>, max_retries: u32) -> ApiGateway {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            max_requests: 100,
            window: Duration::from_secs(15),
            warning_threshold: 0.8,
        }));
        let cache = Arc::new(ResponseCache::new(CacheConfig {
            ttl: Duration::from_secs(60),
            capacity: 50,
        }));
        ApiGateway::new(mock, limiter, cache, max_retries)
    }

    #[test]
    fn test_from_config_wires_components() {
        let mut config = GatewayConfig::default();
        config.base_url = "https://api.example.com/v2".to_string();
        config.rate_limit.max_requests = 7;
        config.cache.capacity = 3;
        config.max_retries = 5;

        let gateway = ApiGateway::from_config(&config, "secret-token").unwrap();
        assert_eq!(gateway.limiter().status().total, 7);
        assert_eq!(gateway.cache().stats().capacity, 3);
        assert_eq!(gateway.calls_made(), 0);
        assert!(format!("{:?}", gateway).contains("max_retries: 5"));
    }

    #[test]
    fn test_top_resource_segment() {
        assert_eq!(top_resource_segment("/time_entries/123"), "/time_entries");
        assert_eq!(top_resource_segment("/clients"), "/clients");
        assert_eq!(top_resource_segment("/clients/5/contacts"), "/clients");
    }

    #[tokio::test]
    async fn test_get_success_is_cached() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, json!({"clients": []}));
        let gateway = gateway(Arc::clone(&mock), 3);

        let first = gateway
            .request(HttpMethod::Get, "/clients", None, &[])
            .await
            .unwrap();
        assert_eq!(first, json!({"clients": []}));

        // Second call never reaches the transport.
        let second = gateway
            .request(HttpMethod::Get, "/clients", None, &[])
            .await
            .unwrap();
        assert_eq!(second, first);
        assert_eq!(mock.requests().len(), 1);
        assert_eq!(gateway.calls_made(), 1);
    }

    #[tokio::test]
    async fn test_rate_limited_then_success_retries() {
        let mock = Arc::new(MockTransport::new());
        mock.push_rate_limited(Some(Duration::from_millis(10)));
        mock.push_json(200, json!({"ok": true}));
        let gateway = gateway(Arc::clone(&mock), 3);

        let value = gateway
            .request(HttpMethod::Get, "/projects", None, &[])
            .await
            .unwrap();
        assert_eq!(value, json!({"ok": true}));
        assert_eq!(mock.requests().len(), 2);
        assert_eq!(gateway.calls_made(), 2);
    }

    #[tokio::test]
    async fn test_retries_exhausted_surfaces_last_rate_limit() {
        let mock = Arc::new(MockTransport::new());
        for _ in 0..2 {
            mock.push_rate_limited(Some(Duration::from_millis(5)));
        }
        let gateway = gateway(Arc::clone(&mock), 2);

        let err = gateway
            .request(HttpMethod::Get, "/projects", None, &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TallyError::Gateway(GatewayError::RetriesExhausted { attempts: 2, .. })
        ));
        assert_eq!(mock.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_error_is_immediate() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(500, json!({"error": "boom"}));
        let gateway = gateway(Arc::clone(&mock), 3);

        let err = gateway
            .request(HttpMethod::Get, "/users", None, &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TallyError::Gateway(GatewayError::RequestFailed { status: 500, .. })
        ));
        // No retry for server errors.
        assert_eq!(mock.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_204_yields_null() {
        let mock = Arc::new(MockTransport::new());
        mock.push(Ok(crate::transport::TransportResponse {
            status: 204,
            retry_after: None,
            body: String::new(),
        }));
        let gateway = gateway(Arc::clone(&mock), 3);

        let value = gateway
            .request(HttpMethod::Delete, "/time_entries/9", None, &[])
            .await
            .unwrap();
        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn test_mutation_invalidates_resource_cache() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, json!({"time_entries": [1]}));
        mock.push_json(200, json!({"clients": []}));
        mock.push_json(201, json!({"id": 7}));
        mock.push_json(200, json!({"time_entries": [1, 2]}));
        let gateway = gateway(Arc::clone(&mock), 3);

        gateway
            .request(HttpMethod::Get, "/time_entries", None, &[])
            .await
            .unwrap();
        gateway
            .request(HttpMethod::Get, "/clients", None, &[])
            .await
            .unwrap();

        // POST under /time_entries blows away that resource's GETs only.
        gateway
            .request(HttpMethod::Post, "/time_entries", Some(json!({"hours": 1})), &[])
            .await
            .unwrap();

        let refreshed = gateway
            .request(HttpMethod::Get, "/time_entries", None, &[])
            .await
            .unwrap();
        assert_eq!(refreshed, json!({"time_entries": [1, 2]}));
        // /clients stayed cached: 4 transport calls total, not 5.
        gateway
            .request(HttpMethod::Get, "/clients", None, &[])
            .await
            .unwrap();
        assert_eq!(mock.requests().len(), 4);
    }

    #[tokio::test]
    async fn test_unauthorized_flag_propagates() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(401, json!({"error": "bad token"}));
        let gateway = gateway(Arc::clone(&mock), 3);

        let err = gateway
            .request(HttpMethod::Get, "/users/me", None, &[])
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
    }
}
