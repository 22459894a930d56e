//! Host metric samples, providers and formatters.
//!
//! Readers ([`collector`], [`network`]) take one synchronous reading of the
//! host. A [`provider::PeriodicProvider`] drives a reader on an interval and
//! emits [`traits::ProviderEvent`]s, and a [`traits::Formatter`] turns each raw
//! sample into the shape returned to HTTP callers.

pub mod collector;
pub mod data;
pub mod format;
pub mod network;
pub mod provider;
pub mod stats;
pub mod traits;

// Re-export commonly used items
pub use collector::SystemCollector;
pub use data::{SystemSnapshot, TrafficSample};
pub use format::{
    format_bytes, FormattedSnapshot, FormattedTraffic, SnapshotFormatter, TrafficFormatter,
};
pub use network::NetworkTrafficReader;
pub use provider::PeriodicProvider;
pub use stats::SnapshotStats;
pub use traits::{Formatter, MetricsProvider, ProviderEvent, SampleReader};
