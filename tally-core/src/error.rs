//! Error types for TALLY operations

use thiserror::Error;

/// Gateway and upstream HTTP errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Upstream request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Rate limited by upstream, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Invalid upstream response: {reason}")]
    InvalidResponse { reason: String },

    #[error("Pagination failed on page {page}: {reason}")]
    PaginationFailed { page: u32, reason: String },

    #[error("Gave up after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },
}

impl GatewayError {
    /// Whether this error was ultimately caused by upstream throttling.
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            GatewayError::RateLimited { .. }
                | GatewayError::RequestFailed { status: 429, .. }
        )
    }

    /// Whether an outer layer should consider re-authentication.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            GatewayError::RequestFailed {
                status: 401 | 403,
                ..
            }
        )
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {reason}")]
    FileUnreadable { path: String, reason: String },

    #[error("Cannot parse config file {path}: {reason}")]
    ParseFailed { path: String, reason: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Entity resolution errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Directory snapshot unavailable: {reason}")]
    SnapshotUnavailable { reason: String },

    #[error("Query must not be empty")]
    EmptyQuery,
}

/// Master error type for all TALLY errors.
#[derive(Debug, Clone, Error)]
pub enum TallyError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),
}

impl TallyError {
    /// See [`GatewayError::is_rate_limited`].
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, TallyError::Gateway(e) if e.is_rate_limited())
    }

    /// See [`GatewayError::is_unauthorized`].
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, TallyError::Gateway(e) if e.is_unauthorized())
    }
}

/// Result type alias for TALLY operations.
pub type TallyResult<T> = Result<T, TallyError>;

// =============================================================================
// TESTS
// =============================================================================
