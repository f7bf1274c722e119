//! What happens to a session once it cannot be renewed

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use arena_auth::{CredentialStore, TokenKind};
use tracing::warn;

/// Host hook run exactly once per failed refresh.
///
/// Implementations typically clear stored credentials and send the user back
/// to login. The session client awaits it before releasing the callers that
/// were waiting on the refresh.
pub trait SessionInvalidator: Send + Sync {
    fn invalidate(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Clears both tokens from the store.
pub struct ClearStore {
    store: Arc<dyn CredentialStore>,
}

impl ClearStore {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }
}

impl SessionInvalidator for ClearStore {
    fn invalidate(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            for kind in [TokenKind::Access, TokenKind::Refresh] {
                if let Err(e) = self.store.clear(kind).await {
                    warn!(token = kind.label(), error = %e, "failed to clear credential");
                }
            }
            warn!("session expired, credentials cleared");
        })
    }
}
