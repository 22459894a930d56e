//! Bounded sampling sessions.
//!
//! A session turns the open-ended event stream of a
//! [`MetricsProvider`](crate::metrics::MetricsProvider) into exactly one
//! batch: it owns the provider for its lifetime, accumulates formatted
//! samples into a [`SamplingWindow`], and finishes when the target count is
//! reached, the deadline passes, the provider fails, or it is cancelled.
//! The [`SessionRegistry`] makes concurrent callers of the same kind share
//! one session instead of starting duplicate providers.

pub mod bounded;
pub mod registry;
pub mod window;

pub use bounded::{collect, start_or_attach, SessionConfig};
pub use registry::{Acquired, SessionHandle, SessionOwner, SessionRegistry};
pub use window::{SamplingWindow, WindowMode};

use crate::error::SessionError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Terminal result shared by every waiter of a session: the collected
/// samples in arrival order, or the reason none could be returned.
pub type SessionOutcome<T> = Result<Arc<[T]>, SessionError>;

/// Lifecycle of a session as seen through the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No session of this kind exists
    Idle,
    Running,
    Completed,
    Failed,
}

/// Registry key naming a category of session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKind(Cow<'static, str>);

impl SessionKind {
    /// Multi-snapshot system monitor
    pub const SYSTEM: SessionKind = SessionKind(Cow::Borrowed("system"));
    /// Rolling snapshot history
    pub const HISTORY: SessionKind = SessionKind(Cow::Borrowed("history"));
    /// Network traffic sampling
    pub const NETWORK: SessionKind = SessionKind(Cow::Borrowed("network"));

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
