//! Session metrics
//!
//! - `session_refresh_total` (counter): refresh round trips, label `outcome`
//!   (`success` | `failure`); a missing refresh token is not counted
//! - `session_refresh_waiters_total` (counter): callers that queued behind a refresh
//! - `session_retries_total` (counter): requests replayed after a 401
//! - `session_expired_total` (counter): sessions invalidated after a failed refresh
//!
//! Without an installed recorder these are no-ops. The host decides whether
//! and how to export them.

/// Record the end of one refresh round trip.
pub fn record_refresh(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("session_refresh_total", "outcome" => outcome).increment(1);
}

/// Record a caller queued behind an in-flight refresh.
pub fn record_waiter() {
    metrics::counter!("session_refresh_waiters_total").increment(1);
}

/// Record a request replayed with a renewed token.
pub fn record_retry() {
    metrics::counter!("session_retries_total").increment(1);
}

/// Record a session invalidation.
pub fn record_session_expired() {
    metrics::counter!("session_expired_total").increment(1);
}
