//! Process-wide guard allowing one running session per kind.

use crate::error::SessionError;
use crate::session::{SessionKind, SessionOutcome, SessionState};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

type OutcomeSlot<T> = Option<SessionOutcome<T>>;

/// Waiter-side view of one session.
///
/// Every clone observes the same single outcome; [`SessionHandle::wait`]
/// returns the same `Arc` to all of them.
pub struct SessionHandle<T> {
    id: Uuid,
    kind: SessionKind,
    outcome: watch::Receiver<OutcomeSlot<T>>,
    cancel: CancellationToken,
}

impl<T> Clone for SessionHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            kind: self.kind.clone(),
            outcome: self.outcome.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<T> SessionHandle<T> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> &SessionKind {
        &self.kind
    }

    /// Stop the session now. Whatever was collected so far becomes the result.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> SessionState {
        match &*self.outcome.borrow() {
            None => SessionState::Running,
            Some(Ok(_)) => SessionState::Completed,
            Some(Err(_)) => SessionState::Failed,
        }
    }
}

impl<T: Clone> SessionHandle<T> {
    /// Wait for the session to reach a terminal state.
    pub async fn wait(&self) -> SessionOutcome<T> {
        let mut outcome = self.outcome.clone();
        let result = match outcome.wait_for(Option::is_some).await {
            Ok(slot) => slot.clone().unwrap_or(Err(SessionError::Aborted)),
            // Owner dropped without publishing
            Err(_) => Err(SessionError::Aborted),
        };
        result
    }
}

/// Exclusive right to drive a session and publish its outcome.
///
/// Dropping an owner without publishing clears the registry entry, and
/// attached waiters then observe [`SessionError::Aborted`].
pub struct SessionOwner<T> {
    id: Uuid,
    kind: SessionKind,
    sender: watch::Sender<OutcomeSlot<T>>,
    cancel: CancellationToken,
    registry: SessionRegistry<T>,
}

impl<T> SessionOwner<T> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> &SessionKind {
        &self.kind
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Clear the registry entry and hand the outcome to every waiter, as one
    /// step with respect to concurrent `acquire_or_attach` calls.
    pub fn publish(self, outcome: SessionOutcome<T>) {
        let mut sessions = self.registry.lock();
        remove_if_owner(&mut sessions, &self.kind, self.id);
        self.sender.send_replace(Some(outcome));
    }
}

impl<T> Drop for SessionOwner<T> {
    fn drop(&mut self) {
        self.registry.release(&self.kind, self.id);
    }
}

/// Result of [`SessionRegistry::acquire_or_attach`].
pub struct Acquired<T> {
    pub handle: SessionHandle<T>,
    /// Present only for the caller that created the session.
    pub owner: Option<SessionOwner<T>>,
}

impl<T> Acquired<T> {
    pub fn is_new(&self) -> bool {
        self.owner.is_some()
    }
}

/// Maps each [`SessionKind`] to at most one live session.
///
/// Cloning is cheap; clones share the same map. Build one per sample type at
/// startup and inject it where sessions are started.
pub struct SessionRegistry<T> {
    sessions: Arc<Mutex<HashMap<SessionKind, SessionHandle<T>>>>,
}

impl<T> Clone for SessionRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
        }
    }
}

impl<T> Default for SessionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SessionRegistry<T> {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionKind, SessionHandle<T>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the running session for `kind`, or register a new one and hand
    /// its owner to the caller.
    pub fn acquire_or_attach(&self, kind: &SessionKind) -> Acquired<T> {
        let mut sessions = self.lock();
        if let Some(handle) = sessions.get(kind) {
            debug!(kind = %kind, session_id = %handle.id, "Attaching to running session");
            return Acquired {
                handle: handle.clone(),
                owner: None,
            };
        }

        let id = Uuid::new_v4();
        let (sender, outcome) = watch::channel(None);
        let cancel = CancellationToken::new();
        let handle = SessionHandle {
            id,
            kind: kind.clone(),
            outcome,
            cancel: cancel.clone(),
        };
        sessions.insert(kind.clone(), handle.clone());

        Acquired {
            handle,
            owner: Some(SessionOwner {
                id,
                kind: kind.clone(),
                sender,
                cancel,
                registry: self.clone(),
            }),
        }
    }

    /// Clear the entry for `kind` if it still belongs to `session_id`.
    pub fn release(&self, kind: &SessionKind, session_id: Uuid) -> bool {
        let mut sessions = self.lock();
        remove_if_owner(&mut sessions, kind, session_id)
    }

    /// Cancel the running session of `kind`. Returns `false` when none is running.
    pub fn cancel(&self, kind: &SessionKind) -> bool {
        match self.lock().get(kind) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    pub fn handle(&self, kind: &SessionKind) -> Option<SessionHandle<T>> {
        self.lock().get(kind).cloned()
    }

    pub fn state(&self, kind: &SessionKind) -> SessionState {
        self.lock()
            .get(kind)
            .map_or(SessionState::Idle, SessionHandle::state)
    }

    pub fn is_running(&self, kind: &SessionKind) -> bool {
        self.state(kind) == SessionState::Running
    }

    /// Number of kinds with a live session.
    pub fn active_sessions(&self) -> usize {
        self.lock().len()
    }
}

fn remove_if_owner<T>(
    sessions: &mut HashMap<SessionKind, SessionHandle<T>>,
    kind: &SessionKind,
    session_id: Uuid,
) -> bool {
    let owned = sessions
        .get(kind)
        .is_some_and(|handle| handle.id == session_id);
    if owned {
        sessions.remove(kind);
        debug!(kind = %kind, session_id = %session_id, "Released session");
    }
    owned
}
