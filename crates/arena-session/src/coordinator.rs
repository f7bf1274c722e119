//! Single-flight coordination of token refreshes
//!
//! At most one refresh runs per coordinator. The caller that finds the
//! coordinator `Idle` becomes the leader and performs the refresh; callers
//! that arrive while it runs are queued and all receive the leader's outcome.
//!
//! State transitions:
//! - Idle → Refreshing (leader acquired)
//! - Refreshing → Refreshing (follower queued)
//! - Refreshing → Idle (leader settled, or leader guard dropped)
//!
//! A leader that goes away without settling has not learned anything about
//! the session. Its followers are released as [`Released::Abandoned`] and
//! are expected to call `acquire` again.
//!
//! The state lock is only held for the check-and-set, the enqueue, and the
//! queue hand-off. It is never held across an `.await`, so a follower is
//! always queued before it yields.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Result of one refresh: the new access token, or why it could not be had.
pub type Outcome = arena_auth::Result<String>;

/// Refresh state. A queue only exists while a refresh is in flight.
enum RefreshState {
    Idle,
    Refreshing {
        waiters: VecDeque<oneshot::Sender<Outcome>>,
    },
}

/// What `acquire` hands back.
pub enum Acquired {
    /// No refresh was running; the caller must run one and settle it.
    Leader(LeaderGuard),
    /// A refresh is running; await its outcome.
    Follower(Waiter),
}

/// Per-client refresh coordinator. Clones share state.
#[derive(Clone)]
pub struct Coordinator {
    state: Arc<Mutex<RefreshState>>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RefreshState::Idle)),
        }
    }

    /// Become the leader of a new refresh, or queue behind the running one.
    pub fn acquire(&self) -> Acquired {
        let mut state = lock(&self.state);
        if let RefreshState::Refreshing { waiters } = &mut *state {
            let (tx, rx) = oneshot::channel();
            waiters.push_back(tx);
            debug!(position = waiters.len(), "refresh in flight, queued as follower");
            crate::metrics::record_waiter();
            return Acquired::Follower(Waiter { rx });
        }

        *state = RefreshState::Refreshing {
            waiters: VecDeque::new(),
        };
        debug!("refresh leader acquired");
        Acquired::Leader(LeaderGuard {
            state: self.state.clone(),
            settled: false,
        })
    }

    /// Whether a refresh is in flight.
    pub fn is_refreshing(&self) -> bool {
        matches!(*lock(&self.state), RefreshState::Refreshing { .. })
    }

    /// Number of followers queued behind the running refresh.
    pub fn waiting(&self) -> usize {
        match &*lock(&self.state) {
            RefreshState::Idle => 0,
            RefreshState::Refreshing { waiters } => waiters.len(),
        }
    }
}

/// Proof of leadership. Settling it releases every follower.
///
/// Dropping the guard without settling (the refresh panicked or its future
/// was cancelled) returns the coordinator to `Idle` and releases followers
/// as [`Released::Abandoned`], so it cannot stay `Refreshing`.
pub struct LeaderGuard {
    state: Arc<Mutex<RefreshState>>,
    settled: bool,
}

impl LeaderGuard {
    /// Release every queued follower with `outcome`, in the order they
    /// queued, and return the coordinator to `Idle`.
    pub fn settle(mut self, outcome: Outcome) {
        self.settled = true;
        let waiters = self.take_waiters();
        debug!(
            followers = waiters.len(),
            success = outcome.is_ok(),
            "refresh settled"
        );
        for waiter in waiters {
            // A follower that stopped waiting has dropped its receiver
            let _ = waiter.send(outcome.clone());
        }
    }

    fn take_waiters(&self) -> VecDeque<oneshot::Sender<Outcome>> {
        match std::mem::replace(&mut *lock(&self.state), RefreshState::Idle) {
            RefreshState::Refreshing { waiters } => waiters,
            RefreshState::Idle => VecDeque::new(),
        }
    }
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        if !self.settled {
            // Dropping the senders wakes every follower with `Abandoned`
            let waiters = self.take_waiters();
            warn!(
                followers = waiters.len(),
                "refresh leader dropped before settling, releasing followers to retry"
            );
        }
    }
}

/// How a follower was let go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Released {
    /// The leader finished the refresh with this outcome.
    Settled(Outcome),
    /// The leader was dropped before settling; nothing is known.
    Abandoned,
}

/// A queued follower's ticket.
pub struct Waiter {
    rx: oneshot::Receiver<Outcome>,
}

impl Waiter {
    /// Suspend until the leader settles or is dropped.
    pub async fn wait(self) -> Released {
        match self.rx.await {
            Ok(outcome) => Released::Settled(outcome),
            Err(_) => Released::Abandoned,
        }
    }
}

// Nothing panics while the lock is held, so a poisoned state is still consistent.
fn lock(state: &Mutex<RefreshState>) -> MutexGuard<'_, RefreshState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
