//! Credential storage with per-entry expiry
//!
//! The store holds at most one access and one refresh token. Every entry has
//! an absolute expiry; a read past it behaves as if the entry was never
//! written, the way a browser drops an expired cookie.
//!
//! `FileStore` keeps the pair across restarts in a JSON file written with
//! temp-file + rename so a crash mid-write never leaves a torn file.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::token::{TokenLifetimes, TokenPair};

/// Boxed future returned by [`CredentialStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Which half of the credential pair an entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn label(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// Narrow key-value interface the session layer reads and writes through.
///
/// Uses `Pin<Box<dyn Future>>` return types so hosts can hand the session
/// client an `Arc<dyn CredentialStore>`.
pub trait CredentialStore: Send + Sync {
    /// Current token of `kind`, or `None` if never set, cleared, or expired.
    fn get(&self, kind: TokenKind) -> StoreFuture<'_, Option<String>>;

    /// Replace the token of `kind`; it stops being readable after `ttl`.
    fn set(&self, kind: TokenKind, token: String, ttl: Duration) -> StoreFuture<'_, Result<()>>;

    /// Remove the token of `kind`. Clearing an absent entry is not an error.
    fn clear(&self, kind: TokenKind) -> StoreFuture<'_, Result<()>>;
}

/// Write a freshly issued pair into `store`.
pub async fn establish(
    store: &dyn CredentialStore,
    pair: &TokenPair,
    lifetimes: &TokenLifetimes,
) -> Result<()> {
    store
        .set(
            TokenKind::Access,
            pair.access.expose().clone(),
            lifetimes.access,
        )
        .await?;
    store
        .set(
            TokenKind::Refresh,
            pair.refresh.expose().clone(),
            lifetimes.refresh,
        )
        .await
}

/// Stored token with its absolute expiry in unix milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    token: String,
    expires_at: u64,
}

impl Entry {
    fn new(token: String, ttl: Duration) -> Self {
        let ttl_millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        Self {
            token,
            expires_at: now_millis().saturating_add(ttl_millis),
        }
    }

    fn live(&self, now_millis: u64) -> Option<&str> {
        (now_millis < self.expires_at).then_some(self.token.as_str())
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<TokenKind, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, kind: TokenKind) -> StoreFuture<'_, Option<String>> {
        Box::pin(async move {
            let entries = self.entries.lock().await;
            entries
                .get(&kind)
                .and_then(|entry| entry.live(now_millis()))
                .map(str::to_owned)
        })
    }

    fn set(&self, kind: TokenKind, token: String, ttl: Duration) -> StoreFuture<'_, Result<()>> {
        Box::pin(async move {
            self.entries.lock().await.insert(kind, Entry::new(token, ttl));
            Ok(())
        })
    }

    fn clear(&self, kind: TokenKind) -> StoreFuture<'_, Result<()>> {
        Box::pin(async move {
            self.entries.lock().await.remove(&kind);
            Ok(())
        })
    }
}

/// JSON file backed store.
///
/// The Mutex serializes writes; reads hold it only long to clone one entry.
pub struct FileStore {
    path: PathBuf,
    state: Mutex<HashMap<TokenKind, Entry>>,
}

impl FileStore {
    /// Load the store from `path`, creating an empty `{}` file on first use.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading session file: {e}")))?;
            let entries: HashMap<TokenKind, Entry> = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing session file: {e}")))?;
            info!(path = %path.display(), entries = entries.len(), "loaded session");
            entries
        } else {
            info!(path = %path.display(), "session file not found, starting signed out");
            let entries = HashMap::new();
            write_atomic(&path, &entries).await?;
            entries
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileStore {
    fn get(&self, kind: TokenKind) -> StoreFuture<'_, Option<String>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            state
                .get(&kind)
                .and_then(|entry| entry.live(now_millis()))
                .map(str::to_owned)
        })
    }

    fn set(&self, kind: TokenKind, token: String, ttl: Duration) -> StoreFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.insert(kind, Entry::new(token, ttl));
            debug!(kind = kind.label(), "stored token");
            write_atomic(&self.path, &state).await
        })
    }

    fn clear(&self, kind: TokenKind) -> StoreFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if state.remove(&kind).is_some() {
                debug!(kind = kind.label(), "cleared token");
                write_atomic(&self.path, &state).await?;
            }
            Ok(())
        })
    }
}

/// Write the session file via a sibling temp file and rename.
///
/// The file holds live credentials, so it is created `0600` on unix.
async fn write_atomic(path: &Path, data: &HashMap<TokenKind, Entry>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::CredentialParse(format!("serializing session: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("session path has no parent directory".into()))?;
    if !dir.as_os_str().is_empty() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::Io(format!("creating session directory: {e}")))?;
    }

    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp session file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting session file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp session file: {e}")))?;

    debug!(path = %path.display(), "persisted session");
    Ok(())
}
