//! TALLY Gateway - upstream API access layer
//!
//! Single chokepoint for all upstream calls. Composes a sliding-window
//! rate limiter and a TTL+LRU response cache, adds retry/backoff on 429
//! responses, and walks multi-page result sets sequentially.
//!
//! The limiter and cache are process-wide shared handles: construct them
//! once, wrap in `Arc`, and pass into every gateway instance. Tests get
//! isolated instances the same way.

pub mod cache;
pub mod client;
pub mod limiter;
pub mod paginate;
pub mod transport;

pub use cache::{CacheStats, ResponseCache};
pub use client::ApiGateway;
pub use limiter::{RateLimiter, RateLimiterStatus};
pub use paginate::{auto_paginate, auto_paginate_with, PageEnvelope, Paginated, PaginateOptions};
pub use transport::{
    HttpMethod, HttpTransport, MockTransport, ReqwestTransport, TransportRequest,
    TransportResponse,
};
