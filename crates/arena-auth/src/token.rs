//! Credential exchanges with the arena API
//!
//! 1. Login: host-supplied credentials for a fresh pair
//! 2. Refresh: the stored refresh token for a new access token (and,
//!    when the server rotates it, a new refresh token)
//!
//! Both calls go out on the bare `reqwest::Client`, never through the
//! session pipelines, so they cannot recurse into another refresh.

use std::time::Duration;

use common::Secret;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::{DEFAULT_ACCESS_TTL, DEFAULT_REFRESH_TTL};
use crate::error::{Error, Result};
use crate::store::{CredentialStore, TokenKind};

/// An access/refresh pair as issued by login.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: Secret<String>,
    pub refresh: Secret<String>,
}

/// How long each kind of token stays in the store after it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access: DEFAULT_ACCESS_TTL,
            refresh: DEFAULT_REFRESH_TTL,
        }
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

/// Refresh endpoint body. `refresh` is only present when the server rotates it.
#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

#[derive(Deserialize)]
struct LoginResponse {
    access: String,
    refresh: String,
}

/// Trade the stored refresh token for a new access token.
///
/// Fails with `NoRefreshToken` before touching the network when the store has
/// no refresh token. Any non-2xx answer, transport failure, or unreadable
/// body is `RefreshFailed`. The new tokens are written back to `store`; a
/// failed write is logged and the fresh access token is still returned.
pub async fn refresh(
    client: &reqwest::Client,
    url: &str,
    store: &dyn CredentialStore,
    lifetimes: &TokenLifetimes,
) -> Result<String> {
    let refresh_token = store
        .get(TokenKind::Refresh)
        .await
        .ok_or(Error::NoRefreshToken)?;

    let response = client
        .post(url)
        .json(&RefreshRequest {
            refresh: &refresh_token,
        })
        .send()
        .await
        .map_err(|e| Error::RefreshFailed(format!("refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::RefreshFailed(format!(
            "refresh endpoint returned {status}: {body}"
        )));
    }

    let renewed = response
        .json::<RefreshResponse>()
        .await
        .map_err(|e| Error::RefreshFailed(format!("invalid refresh response: {e}")))?;

    if let Err(e) = store
        .set(TokenKind::Access, renewed.access.clone(), lifetimes.access)
        .await
    {
        warn!(error = %e, "failed to persist refreshed access token");
    }
    if let Some(rotated) = renewed.refresh {
        debug!("refresh token rotated");
        if let Err(e) = store
            .set(TokenKind::Refresh, rotated, lifetimes.refresh)
            .await
        {
            warn!(error = %e, "failed to persist rotated refresh token");
        }
    }

    Ok(renewed.access)
}

/// Exchange login credentials for a new pair.
///
/// `body` is passed through as-is (username/password, OTP, OAuth code); its
/// shape belongs to the host. The pair is returned, not stored.
pub async fn login(
    client: &reqwest::Client,
    url: &str,
    body: &serde_json::Value,
) -> Result<TokenPair> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| Error::LoginFailed(format!("login request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::LoginFailed(format!(
            "login endpoint returned {status}: {body}"
        )));
    }

    let issued = response
        .json::<LoginResponse>()
        .await
        .map_err(|e| Error::LoginFailed(format!("invalid login response: {e}")))?;

    Ok(TokenPair {
        access: Secret::new(issued.access),
        refresh: Secret::new(issued.refresh),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use axum::Json;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::post;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::net::TcpListener;

    const HOUR: Duration = Duration::from_secs(3600);

    /// Start a mock token endpoint answering every POST with `status`/`body`.
    /// Returns the endpoint URL and a counter of received requests.
    async fn start_token_server(
        status: StatusCode,
        body: serde_json::Value,
    ) -> (String, Arc<AtomicU64>) {
        let hits = Arc::new(AtomicU64::new(0));
        let counter = hits.clone();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let app = axum::Router::new().route(
                "/token",
                post(move |Json(request): Json<serde_json::Value>| {
                    let counter = counter.clone();
                    let body = body.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        let mut body = body;
                        body["echo"] = request;
                        (status, Json(body)).into_response()
                    }
                }),
            );
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}/token"), hits)
    }

    async fn store_with_refresh(token: &str) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .set(TokenKind::Refresh, token.into(), HOUR)
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn refresh_without_refresh_token_skips_network() {
        let (url, hits) =
            start_token_server(StatusCode::OK, serde_json::json!({"access": "at_new"})).await;
        let store = MemoryStore::new();

        let result = refresh(
            &reqwest::Client::new(),
            &url,
            &store,
            &TokenLifetimes::default(),
        )
        .await;

        assert_eq!(result.unwrap_err(), Error::NoRefreshToken);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn refresh_stores_new_access_token() {
        let (url, hits) =
            start_token_server(StatusCode::OK, serde_json::json!({"access": "at_new"})).await;
        let store = store_with_refresh("rt_1").await;

        let access = refresh(
            &reqwest::Client::new(),
            &url,
            &store,
            &TokenLifetimes::default(),
        )
        .await
        .unwrap();

        assert_eq!(access, "at_new");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(
            store.get(TokenKind::Access).await.as_deref(),
            Some("at_new")
        );
        // Not rotated: old refresh token kept
        assert_eq!(store.get(TokenKind::Refresh).await.as_deref(), Some("rt_1"));
    }

    #[tokio::test]
    async fn refresh_sends_refresh_token_in_body() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let app = axum::Router::new().route(
                "/token",
                post(|Json(request): Json<serde_json::Value>| async move {
                    if request == serde_json::json!({"refresh": "rt_body"}) {
                        (StatusCode::OK, Json(serde_json::json!({"access": "at_ok"})))
                    } else {
                        (StatusCode::BAD_REQUEST, Json(serde_json::json!({})))
                    }
                }),
            );
            axum::serve(listener, app).await.unwrap();
        });
        let store = store_with_refresh("rt_body").await;

        let access = refresh(
            &reqwest::Client::new(),
            &format!("http://{addr}/token"),
            &store,
            &TokenLifetimes::default(),
        )
        .await
        .unwrap();
        assert_eq!(access, "at_ok");
    }

    #[tokio::test]
    async fn refresh_stores_rotated_refresh_token() {
        let (url, _hits) = start_token_server(
            StatusCode::OK,
            serde_json::json!({"access": "at_new", "refresh": "rt_rotated"}),
        )
        .await;
        let store = store_with_refresh("rt_1").await;

        refresh(
            &reqwest::Client::new(),
            &url,
            &store,
            &TokenLifetimes::default(),
        )
        .await
        .unwrap();

        assert_eq!(
            store.get(TokenKind::Refresh).await.as_deref(),
            Some("rt_rotated")
        );
    }

    #[tokio::test]
    async fn refresh_non_success_is_refresh_failed() {
        let (url, _hits) = start_token_server(
            StatusCode::UNAUTHORIZED,
            serde_json::json!({"detail": "Token is blacklisted"}),
        )
        .await;
        let store = store_with_refresh("rt_revoked").await;

        let err = refresh(
            &reqwest::Client::new(),
            &url,
            &store,
            &TokenLifetimes::default(),
        )
        .await
        .unwrap_err();

        match err {
            Error::RefreshFailed(msg) => {
                assert!(msg.contains("401"), "message should carry status: {msg}");
                assert!(msg.contains("blacklisted"), "message should carry body: {msg}");
            }
            other => panic!("expected RefreshFailed, got {other:?}"),
        }
        assert!(store.get(TokenKind::Access).await.is_none());
    }

    #[tokio::test]
    async fn refresh_malformed_body_is_refresh_failed() {
        let (url, _hits) =
            start_token_server(StatusCode::OK, serde_json::json!({"token": "wrong-field"})).await;
        let store = store_with_refresh("rt_1").await;

        let err = refresh(
            &reqwest::Client::new(),
            &url,
            &store,
            &TokenLifetimes::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::RefreshFailed(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn refresh_unreachable_endpoint_is_refresh_failed() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let store = store_with_refresh("rt_1").await;

        let err = refresh(
            &reqwest::Client::new(),
            &format!("http://{addr}/token"),
            &store,
            &TokenLifetimes::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::RefreshFailed(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn login_returns_pair() {
        let (url, _hits) = start_token_server(
            StatusCode::OK,
            serde_json::json!({"access": "at_login", "refresh": "rt_login"}),
        )
        .await;

        let pair = login(
            &reqwest::Client::new(),
            &url,
            &serde_json::json!({"username": "ada", "password": "hunter2"}),
        )
        .await
        .unwrap();

        assert_eq!(pair.access.expose(), "at_login");
        assert_eq!(pair.refresh.expose(), "rt_login");
        assert_eq!(format!("{pair:?}").matches("[REDACTED]").count(), 2);
    }

    #[tokio::test]
    async fn login_rejected_is_login_failed() {
        let (url, _hits) = start_token_server(
            StatusCode::BAD_REQUEST,
            serde_json::json!({"detail": "Invalid credentials"}),
        )
        .await;

        let err = login(&reqwest::Client::new(), &url, &serde_json::json!({}))
            .await
            .unwrap_err();
        match err {
            Error::LoginFailed(msg) => assert!(msg.contains("400"), "got: {msg}"),
            other => panic!("expected LoginFailed, got {other:?}"),
        }
    }

    #[test]
    fn default_lifetimes() {
        let lifetimes = TokenLifetimes::default();
        assert_eq!(lifetimes.access, DEFAULT_ACCESS_TTL);
        assert_eq!(lifetimes.refresh, DEFAULT_REFRESH_TTL);
    }
}
