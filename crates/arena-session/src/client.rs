//! Session-aware HTTP client
//!
//! Every application call runs through two stages:
//! 1. Request pipeline (`authorize`): pick a usable access token, renewing a
//!    missing or expiring one before anything is sent
//! 2. Response pipeline (`execute`): on a 401, renew and replay the call
//!    exactly once; a second 401 ends the session for this call
//!
//! Renewal from either stage goes through the same `Coordinator`, so
//! proactive and reactive refreshes never race each other.

use std::sync::Arc;
use std::time::Duration;

use arena_auth::{
    CredentialStore, DEFAULT_LOGIN_PATH, DEFAULT_REFRESH_PATH, EXPIRY_WINDOW, TokenKind,
    TokenLifetimes, establish, expiry_of, is_expiring_within,
};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Method, Request, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::coordinator::{Acquired, Coordinator, Released};
use crate::error::{Error, Result};
use crate::invalidator::SessionInvalidator;

/// Where the API lives and how long credentials are trusted.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub base_url: String,
    pub refresh_path: String,
    pub login_path: String,
    /// An access token expiring within this window is renewed before use.
    pub expiry_window: Duration,
    pub lifetimes: TokenLifetimes,
}

impl SessionConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            expiry_window: EXPIRY_WINDOW,
            lifetimes: TokenLifetimes::default(),
        }
    }
}

/// Snapshot of the stored credentials. Never carries the tokens themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub signed_in: bool,
    pub access_expires_at: Option<u64>,
    pub access_expiring: bool,
    pub refreshing: bool,
}

/// HTTP client that keeps the session's access token valid.
///
/// Cloning is cheap; clones share the store and the refresh coordinator.
#[derive(Clone)]
pub struct SessionClient {
    http: reqwest::Client,
    config: SessionConfig,
    store: Arc<dyn CredentialStore>,
    invalidator: Arc<dyn SessionInvalidator>,
    coordinator: Coordinator,
}

impl SessionClient {
    pub fn new(
        http: reqwest::Client,
        config: SessionConfig,
        store: Arc<dyn CredentialStore>,
        invalidator: Arc<dyn SessionInvalidator>,
    ) -> Self {
        Self {
            http,
            config,
            store,
            invalidator,
            coordinator: Coordinator::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Start building a call to `path`. Send it with [`SessionClient::send`].
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    pub async fn get(&self, path: &str) -> Result<Response> {
        self.send(self.request(Method::GET, path)).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response> {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        self.execute(builder.build()?).await
    }

    /// Send an authenticated request, renewing the token and replaying once
    /// on 401.
    ///
    /// Responses other than 401 are returned as-is, error statuses included.
    /// Streaming bodies are refused up front since they could not be replayed.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        let replay = request.try_clone().ok_or(Error::UnclonableBody)?;

        let token = self.authorize().await?;
        let response = self.http.execute(with_bearer(request, &token)?).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!(url = %replay.url(), "401 from API, renewing access token");
        let token = self.renew(Some(&token)).await?;
        crate::metrics::record_retry();

        let response = self.http.execute(with_bearer(replay, &token)?).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(url = %response.url(), "renewed token rejected, giving up");
            return Err(Error::SessionExpired);
        }
        Ok(response)
    }

    /// An access token that is safe to send, renewing it first if needed.
    pub async fn authorize(&self) -> Result<String> {
        match self.store.get(TokenKind::Access).await {
            Some(token) if !is_expiring_within(Some(&token), self.config.expiry_window) => {
                Ok(token)
            }
            current => {
                debug!(
                    present = current.is_some(),
                    "access token missing or expiring, renewing before send"
                );
                self.renew(current.as_deref()).await
            }
        }
    }

    /// Join or lead the single in-flight refresh.
    ///
    /// `seen` is the token the caller found unusable. A leader that finds a
    /// different, fresh token in the store (an earlier refresh finished in
    /// between) hands that out instead of refreshing again.
    ///
    /// On failure the leader invalidates the session before releasing
    /// followers. Callers that show up during invalidation still queue
    /// behind this episode, so it is invalidated once. A follower whose
    /// leader was dropped mid-refresh queues again, possibly as leader.
    async fn renew(&self, seen: Option<&str>) -> Result<String> {
        let guard = loop {
            match self.coordinator.acquire() {
                Acquired::Leader(guard) => break guard,
                Acquired::Follower(waiter) => match waiter.wait().await {
                    Released::Settled(outcome) => {
                        return outcome.map_err(|e| {
                            debug!(error = %e, "shared refresh failed");
                            Error::SessionExpired
                        });
                    }
                    Released::Abandoned => {
                        debug!("refresh leader went away, acquiring again");
                    }
                },
            }
        };

        let current = self.store.get(TokenKind::Access).await;
        if let Some(token) = current.filter(|token| {
            Some(token.as_str()) != seen
                && !is_expiring_within(Some(token), self.config.expiry_window)
        }) {
            debug!("access token already renewed");
            guard.settle(Ok(token.clone()));
            return Ok(token);
        }

        let url = self.url(&self.config.refresh_path);
        let outcome = arena_auth::refresh(
            &self.http,
            &url,
            self.store.as_ref(),
            &self.config.lifetimes,
        )
        .await;
        // No round trip happens without a refresh token
        if !matches!(outcome, Err(arena_auth::Error::NoRefreshToken)) {
            crate::metrics::record_refresh(outcome.is_ok());
        }

        match &outcome {
            Ok(token) => info!(expires_at = ?expiry_of(token), "access token refreshed"),
            Err(e) => {
                warn!(error = %e, "refresh failed, invalidating session");
                self.invalidator.invalidate().await;
                crate::metrics::record_session_expired();
            }
        }

        let result = outcome.clone().map_err(|_| Error::SessionExpired);
        guard.settle(outcome);
        result
    }

    /// Exchange credentials for a new pair and store it.
    ///
    /// Goes straight to the login endpoint; no bearer header, no retry.
    pub async fn login(&self, credentials: &serde_json::Value) -> Result<()> {
        let url = self.url(&self.config.login_path);
        let pair = arena_auth::login(&self.http, &url, credentials).await?;
        establish(self.store.as_ref(), &pair, &self.config.lifetimes).await?;
        info!(
            expires_at = ?expiry_of(pair.access.expose()),
            "signed in"
        );
        Ok(())
    }

    /// Forget both tokens.
    pub async fn logout(&self) -> Result<()> {
        self.store.clear(TokenKind::Access).await?;
        self.store.clear(TokenKind::Refresh).await?;
        info!("signed out");
        Ok(())
    }

    pub async fn status(&self) -> SessionStatus {
        let access = self.store.get(TokenKind::Access).await;
        let refresh = self.store.get(TokenKind::Refresh).await;
        SessionStatus {
            signed_in: refresh.is_some(),
            access_expires_at: access.as_deref().and_then(expiry_of),
            access_expiring: is_expiring_within(access.as_deref(), self.config.expiry_window),
            refreshing: self.coordinator.is_refreshing(),
        }
    }
}

fn with_bearer(mut request: Request, token: &str) -> Result<Request> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| Error::InvalidToken(e.to_string()))?;
    value.set_sensitive(true);
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(request)
}
