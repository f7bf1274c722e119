//! Error types for credential operations
//!
//! Every variant carries only strings so the type is `Clone`: a single
//! refresh outcome is handed to every caller waiting on it.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("no refresh token available")]
    NoRefreshToken,

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("login failed: {0}")]
    LoginFailed(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(Error::NoRefreshToken.to_string(), "no refresh token available");
        assert_eq!(
            Error::RefreshFailed("refresh endpoint returned 401".into()).to_string(),
            "token refresh failed: refresh endpoint returned 401"
        );
    }

    #[test]
    fn clones_are_equal() {
        let err = Error::Io("disk full".into());
        assert_eq!(err.clone(), err);
    }
}
