//! Web server and sampling configuration.

use crate::session::SessionConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the web server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Host to bind the server to
    pub host: String,
    /// Port to bind the server to
    pub port: u16,
    /// Whether to enable CORS
    pub enable_cors: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: crate::DEFAULT_WEB_PORT,
            enable_cors: true,
        }
    }
}

impl WebConfig {
    /// Create a new web configuration with custom host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Set the host for the web server.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port for the web server.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Enable or disable CORS.
    pub fn with_cors(mut self, enable_cors: bool) -> Self {
        self.enable_cors = enable_cors;
        self
    }

    /// Get the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A session configuration together with the provider tick interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerConfig {
    pub session: SessionConfig,
    pub interval: Duration,
}

impl SamplerConfig {
    pub fn new(session: SessionConfig, interval: Duration) -> Self {
        Self { session, interval }
    }
}

/// Sampling settings for every session kind served over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Multi-snapshot system monitor
    pub system: SamplerConfig,
    /// Network traffic sampling
    pub network: SamplerConfig,
    /// Rolling snapshot history
    pub history: SamplerConfig,
    /// Processes kept per formatted snapshot
    pub max_processes: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            system: SamplerConfig::new(
                SessionConfig::new(5, Duration::from_millis(10_000)),
                Duration::from_millis(2_000),
            ),
            network: SamplerConfig::new(
                SessionConfig::new(10, Duration::from_millis(12_000)),
                Duration::from_millis(1_000),
            ),
            history: SamplerConfig::new(
                SessionConfig::sliding(30, Duration::from_millis(60_000)),
                Duration::from_millis(2_000),
            ),
            max_processes: 3,
        }
    }
}

impl SamplingConfig {
    /// Reject any per-kind setting that would make a session fail up front.
    pub fn validate(&self) -> crate::Result<()> {
        for (name, sampler) in [
            ("system", &self.system),
            ("network", &self.network),
            ("history", &self.history),
        ] {
            sampler.session.validate().map_err(|err| {
                crate::SystemError::config_error(format!("{} sampler: {}", name, err))
            })?;
            if sampler.interval.is_zero() {
                return Err(crate::SystemError::config_error(format!(
                    "{} sampler: interval must be greater than zero",
                    name
                )));
            }
        }
        Ok(())
    }
}
