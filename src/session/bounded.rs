//! The bounded sampling session state machine.

use crate::error::{Result, SessionError};
use crate::metrics::traits::{Formatter, MetricsProvider, ProviderEvent};
use crate::session::registry::{SessionHandle, SessionOwner, SessionRegistry};
use crate::session::window::{SamplingWindow, WindowMode};
use crate::session::{SessionKind, SessionOutcome};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Batch size, deadline and window behavior of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub target_count: usize,
    pub timeout: Duration,
    pub mode: WindowMode,
}

impl SessionConfig {
    /// Collect until `target_count` samples arrived or `timeout` elapsed.
    pub fn new(target_count: usize, timeout: Duration) -> Self {
        Self {
            target_count,
            timeout,
            mode: WindowMode::StopAtTarget,
        }
    }

    /// Keep the latest `target_count` samples until cancelled or `timeout` elapsed.
    pub fn sliding(target_count: usize, timeout: Duration) -> Self {
        Self {
            target_count,
            timeout,
            mode: WindowMode::Slide,
        }
    }

    pub fn with_mode(mut self, mode: WindowMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    pub fn validate(&self) -> std::result::Result<(), SessionError> {
        if self.target_count == 0 {
            return Err(SessionError::InvalidConfig(
                "target count must be at least 1".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(SessionError::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Why the event loop stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    TargetReached,
    DeadlineElapsed,
    Cancelled,
}

/// Collect one batch of formatted samples for `kind`.
///
/// If a session of `kind` is already running, the caller waits for that
/// session's result (its `config`, provider and formatter are used; the ones
/// passed here are discarded). Otherwise `make_provider` is invoked on a new
/// background task that owns the provider until the session ends.
///
/// An invalid `config` is rejected before anything is started or attached.
pub async fn collect<P, F, M>(
    registry: &SessionRegistry<F::Output>,
    kind: SessionKind,
    config: SessionConfig,
    make_provider: M,
    formatter: F,
) -> SessionOutcome<F::Output>
where
    P: MetricsProvider,
    F: Formatter<Input = P::Sample>,
    M: FnOnce() -> Result<P> + Send + 'static,
{
    config.validate()?;
    let handle = start_or_attach(registry, kind, config, make_provider, formatter);
    handle.wait().await
}

/// Start a session for `kind`, or attach to the running one, without waiting
/// for it to finish.
///
/// `config` must already be valid; use [`SessionConfig::validate`] or
/// [`collect`].
pub fn start_or_attach<P, F, M>(
    registry: &SessionRegistry<F::Output>,
    kind: SessionKind,
    config: SessionConfig,
    make_provider: M,
    formatter: F,
) -> SessionHandle<F::Output>
where
    P: MetricsProvider,
    F: Formatter<Input = P::Sample>,
    M: FnOnce() -> Result<P> + Send + 'static,
{
    let acquired = registry.acquire_or_attach(&kind);
    if let Some(owner) = acquired.owner {
        info!(
            kind = %kind,
            session_id = %owner.id(),
            target_count = config.target_count,
            timeout_ms = config.timeout_ms(),
            mode = ?config.mode,
            "Starting sampling session"
        );
        tokio::spawn(drive(owner, config, make_provider, formatter));
    }
    acquired.handle
}

async fn drive<P, F, M>(
    owner: SessionOwner<F::Output>,
    config: SessionConfig,
    make_provider: M,
    formatter: F,
) where
    P: MetricsProvider,
    F: Formatter<Input = P::Sample>,
    M: FnOnce() -> Result<P> + Send + 'static,
{
    let started = Instant::now();
    let deadline = started + config.timeout;
    let cancel = owner.cancellation();

    // Provider construction may block on host reads, so it runs on the
    // blocking pool and counts against the session deadline.
    let built = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        _ = time::sleep_until(deadline) => None,
        built = task::spawn_blocking(make_provider) => Some(built),
    };

    let outcome = match built {
        None => Err(no_data(started)),
        Some(Ok(Ok(mut provider))) => {
            let outcome = run(&mut provider, &config, started, &formatter, cancel).await;
            provider.stop();
            outcome
        }
        Some(Ok(Err(err))) => Err(SessionError::ProviderInit(err.to_string())),
        Some(Err(err)) => Err(SessionError::ProviderInit(format!(
            "provider construction panicked: {}",
            err
        ))),
    };

    match &outcome {
        Ok(samples) => info!(
            kind = %owner.kind(),
            session_id = %owner.id(),
            collected = samples.len(),
            "Sampling session completed"
        ),
        Err(err) => warn!(
            kind = %owner.kind(),
            session_id = %owner.id(),
            "Sampling session failed: {}",
            err
        ),
    }
    owner.publish(outcome);
}

fn no_data(started: Instant) -> SessionError {
    SessionError::NoData {
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    }
}

/// Event loop: one `select!` over cancellation, the deadline and provider
/// events. The deadline timer is dropped with this future, so it can never
/// fire into a finished session.
async fn run<P, F>(
    provider: &mut P,
    config: &SessionConfig,
    started: Instant,
    formatter: &F,
    cancel: &CancellationToken,
) -> SessionOutcome<F::Output>
where
    P: MetricsProvider,
    F: Formatter<Input = P::Sample>,
{
    let mut events = provider
        .start()
        .map_err(|err| SessionError::ProviderInit(err.to_string()))?;
    let mut window = SamplingWindow::new(config.target_count, config.mode);
    let deadline = time::sleep_until(started + config.timeout);
    tokio::pin!(deadline);

    let reason = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break StopReason::Cancelled,
            _ = &mut deadline => break StopReason::DeadlineElapsed,
            event = events.recv() => match event {
                Some(ProviderEvent::Sample(sample)) => {
                    if window.push(formatter.format(&sample)) {
                        break StopReason::TargetReached;
                    }
                }
                Some(ProviderEvent::Error(message)) => {
                    return Err(SessionError::ProviderStream(message));
                }
                None => {
                    return Err(SessionError::ProviderStream(
                        "metrics provider stopped emitting".to_string(),
                    ));
                }
            },
        }
    };

    debug!(?reason, collected = window.len(), "Sampling loop finished");
    if window.is_empty() {
        return Err(no_data(started));
    }
    Ok(window.into_vec().into())
}
