//! # hostpulse - bounded host metric sampling over HTTP
//!
//! Collects CPU, memory, disk, battery, process and network readings from the
//! local host and serves them as JSON. Multi-sample endpoints run a bounded
//! sampling session: a provider emits samples on an interval until a target
//! count is reached or a deadline passes, and concurrent requests for the
//! same kind share one session instead of starting duplicate providers.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hostpulse::{start_web_server, AppState, SamplingConfig, WebConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let state = Arc::new(AppState::new(SamplingConfig::default())?);
//!     start_web_server(WebConfig::default().with_port(3000), state).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod metrics;
pub mod session;
pub mod web;

// Re-export public API
pub use error::{Result, SessionError, SystemError};
pub use metrics::{
    collector::SystemCollector,
    data::{SystemSnapshot, TrafficSample},
    format::{FormattedSnapshot, FormattedTraffic, SnapshotFormatter, TrafficFormatter},
    provider::PeriodicProvider,
    stats::SnapshotStats,
    traits::{Formatter, MetricsProvider, ProviderEvent, SampleReader},
};
pub use session::{
    collect, SessionConfig, SessionKind, SessionOutcome, SessionRegistry, SessionState,
    WindowMode,
};
pub use web::{create_app, start_web_server, AppState, SamplingConfig, WebConfig};

/// The default web server port
pub const DEFAULT_WEB_PORT: u16 = 3000;
