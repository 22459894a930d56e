//! Shared state injected into every handler.

use crate::error::{Result, SystemError};
use crate::metrics::{FormattedSnapshot, FormattedTraffic, SystemCollector};
use crate::session::{SessionKind, SessionRegistry, SessionState};
use crate::web::config::SamplingConfig;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct AppState {
    /// Used by the single-reading endpoints. Sessions build their own.
    collector: Arc<Mutex<SystemCollector>>,
    /// Sessions producing formatted system snapshots (system, history)
    pub snapshots: SessionRegistry<FormattedSnapshot>,
    /// Sessions producing formatted traffic samples (network)
    pub traffic: SessionRegistry<FormattedTraffic>,
    pub sampling: SamplingConfig,
}

impl AppState {
    pub fn new(sampling: SamplingConfig) -> Result<Self> {
        sampling.validate()?;
        Ok(Self {
            collector: Arc::new(Mutex::new(SystemCollector::new()?)),
            snapshots: SessionRegistry::new(),
            traffic: SessionRegistry::new(),
            sampling,
        })
    }

    /// Run `read` against the shared collector on the blocking pool.
    ///
    /// The lock is awaited asynchronously and held only for the duration of
    /// `read`.
    pub async fn with_collector<T, F>(&self, read: F) -> Result<T>
    where
        F: FnOnce(&mut SystemCollector) -> T + Send + 'static,
        T: Send + 'static,
    {
        let mut collector = Arc::clone(&self.collector).lock_owned().await;
        tokio::task::spawn_blocking(move || read(&mut collector))
            .await
            .map_err(|err| SystemError::system_error(format!("collector read failed: {}", err)))
    }

    /// Cancel the running session of `kind`, whichever registry holds it.
    pub fn cancel_session(&self, kind: &SessionKind) -> bool {
        if *kind == SessionKind::NETWORK {
            self.traffic.cancel(kind)
        } else {
            self.snapshots.cancel(kind)
        }
    }

    pub fn session_state(&self, kind: &SessionKind) -> SessionState {
        if *kind == SessionKind::NETWORK {
            self.traffic.state(kind)
        } else {
            self.snapshots.state(kind)
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.snapshots.active_sessions() + self.traffic.active_sessions()
    }
}
