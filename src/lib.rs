pub mod aggregator;
pub mod config;
pub mod orchestrator;
pub mod pool;
pub mod prober;
pub mod reporter;
pub mod util;

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// A monitored endpoint, identified by its URL.
pub type Endpoint = String;

/// Outcome of a single probe against one endpoint.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub endpoint: Endpoint,

    /// HTTP status code, present only when the transport exchange completed
    pub status_code: Option<u16>,

    /// Time from request start until the response headers arrived.
    /// Zero for failed probes.
    pub latency: Duration,

    pub error: Option<ProbeError>,

    /// When the probe was started
    pub timestamp: DateTime<Utc>,
}

impl ProbeResult {
    pub fn success(endpoint: impl Into<Endpoint>, status_code: u16, latency: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            status_code: Some(status_code),
            latency,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(endpoint: impl Into<Endpoint>, error: ProbeError) -> Self {
        Self {
            endpoint: endpoint.into(),
            status_code: None,
            latency: Duration::ZERO,
            error: Some(error),
            timestamp: Utc::now(),
        }
    }

    /// HTTP error codes still count as successful probes; only transport
    /// level failures do not.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Reasons a probe can fail before a response was received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The endpoint could not be turned into a valid request
    InvalidRequest(String),

    /// No response headers arrived within the timeout
    Timeout(Duration),

    /// Connection refused, DNS failure, TLS failure, ...
    Transport(String),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::InvalidRequest(msg) => write!(f, "failed to create HTTP request: {}", msg),
            ProbeError::Timeout(timeout) => write!(f, "request timed out after {:?}", timeout),
            ProbeError::Transport(msg) => write!(f, "failed to ping URL: {}", msg),
        }
    }
}

impl std::error::Error for ProbeError {}
