//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Credentials never live in the TOML; the session file holds the tokens and
//! the login password comes from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use arena_auth::{DEFAULT_LOGIN_PATH, DEFAULT_REFRESH_PATH, TokenLifetimes};
use arena_session::SessionConfig;
use serde::Deserialize;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionSettings,
}

/// Where the arena API lives
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Token storage and lifetimes
#[derive(Debug, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    #[serde(default = "default_expiry_window")]
    pub expiry_window_secs: u64,
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: u64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            expiry_window_secs: default_expiry_window(),
            access_ttl_secs: default_access_ttl(),
            refresh_ttl_secs: default_refresh_ttl(),
        }
    }
}

fn default_refresh_path() -> String {
    DEFAULT_REFRESH_PATH.to_string()
}

fn default_login_path() -> String {
    DEFAULT_LOGIN_PATH.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_store_path() -> PathBuf {
    PathBuf::from("session.json")
}

fn default_expiry_window() -> u64 {
    arena_auth::EXPIRY_WINDOW.as_secs()
}

fn default_access_ttl() -> u64 {
    arena_auth::DEFAULT_ACCESS_TTL.as_secs()
}

fn default_refresh_ttl() -> u64 {
    arena_auth::DEFAULT_REFRESH_TTL.as_secs()
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// `ARENA_BASE_URL` replaces `api.base_url` when set.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(url) = std::env::var("ARENA_BASE_URL") {
            config.api.base_url = url;
        }

        if !config.api.base_url.starts_with("http://")
            && !config.api.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                config.api.base_url
            )));
        }

        if config.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.session.access_ttl_secs == 0 || config.session.refresh_ttl_secs == 0 {
            return Err(common::Error::Config(
                "access_ttl_secs and refresh_ttl_secs must be greater than 0".into(),
            ));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("arena.toml")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            base_url: self.api.base_url.clone(),
            refresh_path: self.api.refresh_path.clone(),
            login_path: self.api.login_path.clone(),
            expiry_window: Duration::from_secs(self.session.expiry_window_secs),
            lifetimes: TokenLifetimes {
                access: Duration::from_secs(self.session.access_ttl_secs),
                refresh: Duration::from_secs(self.session.refresh_ttl_secs),
            },
        }
    }
}
