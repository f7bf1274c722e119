//! Authenticated HTTP client for the arena API
//!
//! Wraps a `reqwest::Client` with the two halves of token renewal:
//! - Request pipeline: before each send, an access token that is missing or
//!   about to expire is renewed first
//! - Response pipeline: a 401 renews the token and replays the call once
//!
//! Both halves renew through one `Coordinator`, so any number of concurrent
//! callers share a single refresh round trip. When that refresh fails the
//! `SessionInvalidator` runs once and every caller gets `SessionExpired`.
//!
//! Refresh lifecycle:
//! 1. First caller to need a token becomes leader, state `Refreshing`
//! 2. Later callers queue as followers
//! 3. Leader settles with the outcome, followers released FIFO, state `Idle`

pub mod client;
pub mod coordinator;
pub mod error;
pub mod invalidator;
pub mod metrics;

pub use client::{SessionClient, SessionConfig, SessionStatus};
pub use coordinator::{Acquired, Coordinator, LeaderGuard, Outcome, Released, Waiter};
pub use error::{Error, Result};
pub use invalidator::{ClearStore, SessionInvalidator};
