//! Default values used throughout the workspace, kept in one place so
//! limits and fallbacks are easy to audit together.

// ============================================================================
// RATE LIMITING
// ============================================================================

/// Default maximum requests allowed inside one sliding window
pub const DEFAULT_RATE_LIMIT_MAX_REQUESTS: usize = 100;

/// Default sliding window length in milliseconds (15 seconds)
pub const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 15_000;

/// Fraction of the window budget at which staggering delays kick in
pub const DEFAULT_RATE_LIMIT_WARNING_THRESHOLD: f64 = 0.8;

/// Upper bound on the staggering delay near the window boundary
pub const MAX_STAGGER_DELAY_MS: u64 = 500;

/// Embargo applied when a 429 response carries no Retry-After header
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 10;

// ============================================================================
// RESPONSE CACHE
// ============================================================================

/// Default cache entry time-to-live in seconds (5 minutes)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default maximum number of cached responses
pub const DEFAULT_CACHE_CAPACITY: usize = 500;

/// Hex characters kept from the request-signature digest
pub const CACHE_KEY_DIGEST_LEN: usize = 16;

// ============================================================================
// GATEWAY
// ============================================================================

/// Default number of attempts before a rate-limited request gives up
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default per-request HTTP timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// PAGINATION
// ============================================================================

/// Default page size for upstream list endpoints
pub const DEFAULT_PER_PAGE: u32 = 100;

/// Circuit breaker: maximum pages walked by one auto-pagination call
pub const DEFAULT_MAX_PAGES: u32 = 10;

// ============================================================================
// ENTITY RESOLUTION
// ============================================================================

/// Directory snapshot time-to-live in seconds (5 minutes)
pub const DEFAULT_SNAPSHOT_TTL_SECS: u64 = 300;

/// Default minimum confidence for resolved entities
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;

/// Default per-kind result cap
pub const DEFAULT_RESOLVE_LIMIT: usize = 5;

// ============================================================================
// ANALYTICS
// ============================================================================

/// Default budget variance tolerance in percent
pub const DEFAULT_BUDGET_TOLERANCE_PCT: f64 = 10.0;

/// Default daily capacity hours for utilization reporting
pub const DEFAULT_CAPACITY_HOURS_PER_DAY: f64 = 8.0;

/// Environment variable consulted as the cost-rate fallback of last resort
pub const ENV_DEFAULT_COST_RATE: &str = "TALLY_DEFAULT_COST_RATE";
