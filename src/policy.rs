//! Adaptive policy: timeout and retry budgets derived from latency history
//!
//! Pure functions over cache snapshots. A device with a consistently slow
//! history gets a generous per-attempt timeout (2x its average) but a reduced
//! retry budget, so the worst-case total wait stays bounded instead of
//! compounding slow timeouts across many retries.

use std::time::Duration;

/// Per-attempt timeout when no usable history exists.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Retry budget when no usable history exists.
pub const DEFAULT_RETRY_BUDGET: u32 = 3;

/// Retry budget for devices whose average response time is above
/// [`SLOW_DEVICE_THRESHOLD`].
pub const REDUCED_RETRY_BUDGET: u32 = 2;

/// Average response time above which a device counts as slow.
pub const SLOW_DEVICE_THRESHOLD: Duration = Duration::from_secs(2);

/// Derived timeout is this multiple of the observed average.
pub const TIMEOUT_MULTIPLIER: u32 = 2;

/// Base of the exponential backoff between failed attempts.
pub const BACKOFF_FACTOR: u32 = 2;

/// Pause before retrying after a timeout (fast retry path).
pub const TIMEOUT_RETRY_PAUSE: Duration = Duration::from_secs(1);

/// Fixed bound on connection establishment, independent of the derived
/// per-attempt timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Cache entries older than this are treated as absent by the policy.
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Effective per-attempt timeout for a device.
///
/// `average` is the staleness-filtered mean response time; `default` is the
/// configured fallback when no usable history exists.
pub fn effective_timeout(average: Option<Duration>, default: Duration) -> Duration {
    match average {
        Some(avg) => avg * TIMEOUT_MULTIPLIER,
        None => default,
    }
}

/// Effective retry budget for a device.
///
/// Slow devices get fewer attempts; everyone else gets the configured base.
pub fn retry_budget(average: Option<Duration>, base: u32) -> u32 {
    match average {
        Some(avg) if avg > SLOW_DEVICE_THRESHOLD => REDUCED_RETRY_BUDGET,
        _ => base,
    }
}

/// Backoff delay before the attempt following `attempt_index` (0-based),
/// scaled by `unit`: `unit * factor^attempt_index`.
pub fn backoff_delay(attempt_index: u32, factor: u32, unit: Duration) -> Duration {
    unit * factor.saturating_pow(attempt_index)
}
