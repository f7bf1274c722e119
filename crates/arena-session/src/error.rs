//! Error types for session client calls

/// Errors surfaced to callers of `SessionClient`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The credential could not be renewed. Terminal for the call; the user
    /// has to sign in again.
    #[error("session expired")]
    SessionExpired,

    /// Network or protocol failure unrelated to authentication.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// The body cannot be replayed, so a 401 could not be retried.
    #[error("request body cannot be replayed")]
    UnclonableBody,

    #[error("access token is not a valid header value: {0}")]
    InvalidToken(String),

    #[error(transparent)]
    Auth(#[from] arena_auth::Error),
}

impl Error {
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Error::SessionExpired)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_expired_is_distinguishable() {
        assert!(Error::SessionExpired.is_session_expired());
        assert!(!Error::UnclonableBody.is_session_expired());
        assert!(!Error::Auth(arena_auth::Error::NoRefreshToken).is_session_expired());
    }

    #[test]
    fn auth_errors_display_transparently() {
        let err: Error = arena_auth::Error::LoginFailed("bad password".into()).into();
        assert_eq!(err.to_string(), "login failed: bad password");
    }
}
