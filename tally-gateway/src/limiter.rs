//! Sliding-window request throttle
//!
//! Counts requests in the trailing window, recomputed on every check rather
//! than using fixed time buckets. The contract is advisory delay, not denial:
//! no operation ever fails, and the caller must itself wait the returned
//! duration before sending.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tally_core::config::RateLimitConfig;
use tally_core::constants::MAX_STAGGER_DELAY_MS;

/// Point-in-time view of the limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterStatus {
    /// Slots still available in the current window.
    pub remaining: usize,
    /// Window budget.
    pub total: usize,
    /// Milliseconds until the oldest counted request leaves the window.
    pub reset_ms: u64,
    /// Whether an upstream embargo is currently active.
    pub is_throttled: bool,
}

#[derive(Debug)]
struct WindowState {
    timestamps: VecDeque<Instant>,
    embargo_until: Option<Instant>,
}

/// Sliding-window rate limiter. Process-wide shared resource: every public
/// call mutates state atomically, so interleaved tasks never observe a
/// half-updated window.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<WindowState>,
}

impl RateLimiter {
    /// Create a limiter with the given window settings.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(WindowState {
                timestamps: VecDeque::new(),
                embargo_until: None,
            }),
        }
    }

    /// How long the caller should wait before sending the next request.
    ///
    /// Returns zero when a slot is freely available, the remaining embargo
    /// when an upstream Retry-After is in force, the time until the oldest
    /// request leaves the window when the budget is spent, and a small
    /// staggering delay when the window is close to full.
    pub fn acquire_permit(&self) -> Duration {
        let now = Instant::now();
        let mut state = self.lock();
        Self::prune(&mut state.timestamps, now, self.config.window);

        if let Some(embargo) = state.embargo_until {
            if embargo > now {
                return embargo - now;
            }
            state.embargo_until = None;
        }

        let count = state.timestamps.len();
        let max = self.config.max_requests;

        if count >= max {
            let oldest = state.timestamps.front().copied().unwrap_or(now);
            return (oldest + self.config.window).saturating_duration_since(now);
        }

        // Near the boundary, spread the remaining requests out so bursts do
        // not cluster at the window edge.
        if (count as f64) >= (max as f64) * self.config.warning_threshold {
            let remaining_slots = (max - count).max(1) as u64;
            let stagger_ms =
                (self.config.window.as_millis() as u64 / remaining_slots / 2).min(MAX_STAGGER_DELAY_MS);
            return Duration::from_millis(stagger_ms);
        }

        Duration::ZERO
    }

    /// Count a request against the current window.
    pub fn record_request(&self) {
        let now = Instant::now();
        let mut state = self.lock();
        Self::prune(&mut state.timestamps, now, self.config.window);
        state.timestamps.push_back(now);
    }

    /// Set an absolute embargo deadline from an upstream Retry-After value.
    pub fn handle_rate_limit(&self, retry_after: Duration) {
        let deadline = Instant::now() + retry_after;
        let mut state = self.lock();
        state.embargo_until = Some(deadline);
        tracing::warn!(retry_after_ms = retry_after.as_millis() as u64, "Upstream embargo set");
    }

    /// Current window occupancy and embargo state.
    pub fn status(&self) -> RateLimiterStatus {
        let now = Instant::now();
        let mut state = self.lock();
        Self::prune(&mut state.timestamps, now, self.config.window);

        let count = state.timestamps.len();
        let reset_ms = state
            .timestamps
            .front()
            .map(|oldest| {
                (*oldest + self.config.window)
                    .saturating_duration_since(now)
                    .as_millis() as u64
            })
            .unwrap_or(0);
        let embargoed = state.embargo_until.is_some_and(|e| e > now);

        RateLimiterStatus {
            remaining: self.config.max_requests.saturating_sub(count),
            total: self.config.max_requests,
            reset_ms,
            is_throttled: embargoed || count >= self.config.max_requests,
        }
    }

    fn prune(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(front) = timestamps.front() {
            if now.saturating_duration_since(*front) > window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WindowState> {
        // Advisory contract: a poisoned lock must not surface as a panic.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// =============================================================================
// TESTS
// =============================================================================


// =============================================================================
// PROPERTY-BASED TESTS
// =============================================================================
