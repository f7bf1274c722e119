//! Access token lifetime inspection
//!
//! Access tokens are JWTs. Only the `exp` claim of the payload is read; the
//! signature is never checked here, the API does that. Anything that cannot
//! be decoded counts as expiring so the caller refreshes instead of sending a
//! credential the server will reject.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::constants::EXPIRY_WINDOW;

#[derive(Deserialize)]
struct Claims {
    exp: f64,
}

/// Whether `token` is absent, undecodable, or expires within [`EXPIRY_WINDOW`].
pub fn is_expiring(token: Option<&str>) -> bool {
    is_expiring_within(token, EXPIRY_WINDOW)
}

/// [`is_expiring`] with a caller-chosen look-ahead window.
pub fn is_expiring_within(token: Option<&str>, window: Duration) -> bool {
    expires_within(token, window, now_secs())
}

/// Same as [`is_expiring`] with an explicit window and clock (unix seconds).
pub fn expires_within(token: Option<&str>, window: Duration, now_secs: u64) -> bool {
    let Some(token) = token else {
        return true;
    };
    match expiry_of(token) {
        Some(exp) => exp <= now_secs.saturating_add(window.as_secs()),
        None => true,
    }
}

/// The `exp` claim of a JWT in unix seconds, if it can be decoded.
pub fn expiry_of(token: &str) -> Option<u64> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };

    // Some issuers keep the padding
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    if !claims.exp.is_finite() || claims.exp < 0.0 {
        return None;
    }
    Some(claims.exp as u64)
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
