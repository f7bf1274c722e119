//! Arena authentication primitives
//!
//! Token inspection, credential storage, and the network exchanges that
//! create or renew a credential pair. This crate has no notion of
//! concurrency between callers; `arena-session` layers the single-flight
//! refresh and the request/response pipelines on top of it.
//!
//! Credential flow:
//! 1. Host calls `token::login()` with the user's credentials
//! 2. Pair persisted via `store::establish()`
//! 3. `inspect::is_expiring()` decides whether the access token can be sent
//! 4. `token::refresh()` trades the refresh token for a new access token
//!    and writes the result back to the store

pub mod constants;
pub mod error;
pub mod inspect;
pub mod store;
pub mod token;

pub use constants::*;
pub use error::{Error, Result};
pub use inspect::{expires_within, expiry_of, is_expiring, is_expiring_within};
pub use store::{CredentialStore, FileStore, MemoryStore, TokenKind, establish};
pub use token::{TokenLifetimes, TokenPair, login, refresh};
