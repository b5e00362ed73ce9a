//! HTTP transport seam
//!
//! The gateway state machine talks to upstream through the [`HttpTransport`]
//! trait so retry, caching, and pagination logic can be exercised without a
//! socket. [`ReqwestTransport`] is the production implementation;
//! [`MockTransport`] serves scripted responses for tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tally_core::{GatewayError, TallyResult};

/// Upstream HTTP methods the gateway issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Only GET responses are cache-eligible.
    pub fn is_get(&self) -> bool {
        matches!(self, HttpMethod::Get)
    }
}

/// One upstream request, fully described.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub path: String,
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Raw upstream response. Status dispatch happens in the gateway, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// Parsed Retry-After header, when present.
    pub retry_after: Option<Duration>,
    pub body: String,
}

/// Transport abstraction. Implementations must be thread-safe.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform one HTTP exchange. Network failures surface as
    /// `GatewayError::Transport`; any HTTP status is an Ok response.
    async fn execute(&self, request: &TransportRequest) -> TallyResult<TransportResponse>;
}

/// Production transport: reqwest with bearer auth and JSON bodies.
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    token: String,
    account_id: Option<String>,
}

impl ReqwestTransport {
    /// Build a transport for the given upstream.
    ///
    /// # Arguments
    /// * `base_url` - Upstream API root, without a trailing slash
    /// * `token` - Bearer token for the auth header
    /// * `account_id` - Optional account scoping header value
    /// * `timeout` - Per-request timeout
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        account_id: Option<String>,
        timeout: Duration,
    ) -> TallyResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
            account_id,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &TransportRequest) -> TallyResult<TransportResponse> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };
        let url = format!("{}{}", self.base_url, request.path);

        let mut builder = self
            .client
            .request(method, &url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json")
            .query(&request.params);

        if let Some(account_id) = &self.account_id {
            builder = builder.header("X-Account-Id", account_id);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| GatewayError::Transport {
            message: format!("HTTP request failed: {}", e),
        })?;

        let status = response.status().as_u16();
        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();

        Ok(TransportResponse {
            status,
            retry_after,
            body,
        })
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|seconds| *seconds >= 0.0)
        .map(Duration::from_secs_f64)
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Scripted transport for tests. Responses are served in push order and
/// every request is recorded for assertion.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<TallyResult<TransportResponse>>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response to serve.
    pub fn push(&self, response: TallyResult<TransportResponse>) {
        self.responses
            .lock()
            .expect("mock lock")
            .push_back(response);
    }

    /// Queue a plain success body.
    pub fn push_json(&self, status: u16, body: Value) {
        self.push(Ok(TransportResponse {
            status,
            retry_after: None,
            body: body.to_string(),
        }));
    }

    /// Queue a 429 with the given Retry-After.
    pub fn push_rate_limited(&self, retry_after: Option<Duration>) {
        self.push(Ok(TransportResponse {
            status: 429,
            retry_after,
            body: String::new(),
        }));
    }

    /// Requests seen so far.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().expect("mock lock").clone()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn execute(&self, request: &TransportRequest) -> TallyResult<TransportResponse> {
        self.requests
            .lock()
            .expect("mock lock")
            .push(request.clone());
        self.responses
            .lock()
            .expect("mock lock")
            .pop_front()
            .unwrap_or_else(|| {
                Err(GatewayError::Transport {
                    message: "MockTransport response queue exhausted".to_string(),
                }
                .into())
            })
    }
}

// =============================================================================
// TESTS
// =============================================================================
