//! Traits for metrics sources.

use crate::error::Result;
use tokio::sync::mpsc;

/// Event delivered by a running [`MetricsProvider`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent<S> {
    /// One reading, emitted once per interval tick.
    Sample(S),
    /// Terminal failure. No further samples follow.
    Error(String),
}

/// A periodic, event-emitting source of samples.
///
/// A provider instance is started at most once. Events arrive on the
/// returned channel in emission order; the channel closes when the provider
/// stops emitting. `stop` halts emission and must be safe to call repeatedly.
pub trait MetricsProvider: Send + 'static {
    type Sample: Send + 'static;

    /// Begin periodic emission.
    fn start(&mut self) -> Result<mpsc::Receiver<ProviderEvent<Self::Sample>>>;

    /// Halt emission and release underlying resources.
    fn stop(&mut self);
}

/// A single synchronous read of some host metric.
///
/// Readers keep whatever state they need between reads (sysinfo handles,
/// previous counter values) and are driven on an interval by
/// [`PeriodicProvider`](crate::metrics::provider::PeriodicProvider).
pub trait SampleReader: Send + 'static {
    type Sample: Send + 'static;

    fn read(&mut self) -> Result<Self::Sample>;
}

/// Pure projection of a raw sample into its caller-facing shape.
///
/// Implementations hold no mutable state, so identical input always yields
/// identical output and a formatter can be shared freely across sessions.
pub trait Formatter: Send + Sync + 'static {
    type Input;
    type Output: Clone + Send + Sync + 'static;

    fn format(&self, sample: &Self::Input) -> Self::Output;
}
