//! Error handling for the hostpulse crate.

/// A specialized `Result` type for hostpulse operations.
pub type Result<T> = std::result::Result<T, SystemError>;

/// The main error type for hostpulse system operations.
#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A metrics provider could not be started or failed to read
    #[error("Metrics provider error: {0}")]
    Provider(String),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A bounded sampling session did not produce a batch
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Generic system error
    #[error("System error: {0}")]
    System(String),
}

impl SystemError {
    /// Create a new metrics provider error
    pub fn provider_error(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new generic system error
    #[allow(clippy::self_named_constructors)]
    pub fn system_error(msg: impl Into<String>) -> Self {
        Self::System(msg.into())
    }
}

/// Terminal failure of a bounded sampling session.
///
/// Every waiter attached to a session receives a clone of the same value.
/// A timeout with at least one collected sample is not an error and never
/// shows up here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Rejected before any provider was constructed
    #[error("Invalid session configuration: {0}")]
    InvalidConfig(String),

    /// The provider could not be constructed or started
    #[error("Failed to initialize metrics provider: {0}")]
    ProviderInit(String),

    /// The provider reported an error mid-stream; collected samples were discarded
    #[error("Metrics provider failed: {0}")]
    ProviderStream(String),

    /// The session ended, by deadline or cancellation, before any sample arrived.
    #[error("No data: session ended after {elapsed_ms}ms without collecting a sample")]
    NoData { elapsed_ms: u64 },

    /// The session task ended without publishing an outcome
    #[error("Sampling session aborted before completion")]
    Aborted,
}
