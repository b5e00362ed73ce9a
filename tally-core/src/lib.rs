//! TALLY Core
//!
//! Data types, error taxonomy, and configuration shared by every other
//! crate in the workspace. Deliberately free of I/O and business logic:
//! anything that talks to the network or computes a report lives in
//! `tally-gateway`, `tally-resolve`, or `tally-analytics`.

pub mod config;
pub mod constants;
pub mod entities;
pub mod error;

pub use config::{CacheConfig, GatewayConfig, RateLimitConfig, RateOverrides};
pub use entities::{
    BudgetAssignment, DirectoryEntry, EntityKind, Invoice, InvoiceState, MatchKind, RateInfo,
    RateSource, ResolvedEntity, TimeRecord,
};
pub use error::{ConfigError, GatewayError, ResolveError, TallyError, TallyResult};

/// Upstream record identifier. The time-tracking service uses numeric ids.
pub type RecordId = i64;
