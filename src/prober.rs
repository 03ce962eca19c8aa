//! Prober - performs a single bounded HTTP probe against one endpoint
//!
//! A probe never fails past its boundary: every outcome, including malformed
//! endpoints and transport errors, is folded into a [`ProbeResult`].
//!
//! Only transport level failures count as failed probes. A completed exchange
//! with an HTTP error status (e.g. 500) is a successful probe that carries the
//! observed status code.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::Url;
use tracing::{instrument, trace, warn};

use crate::{ProbeError, ProbeResult};

/// Executes probes with a shared HTTP client
///
/// The client is reused across probes (connection pooling), so one `Prober`
/// is shared by all workers.
#[derive(Debug, Clone)]
pub struct Prober {
    client: reqwest::Client,
    timeout: Duration,
}

impl Prober {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe `endpoint` with the configured timeout
    pub async fn probe(&self, endpoint: &str) -> ProbeResult {
        self.probe_with_timeout(endpoint, self.timeout).await
    }

    /// Probe `endpoint`, giving up after `timeout`
    ///
    /// Latency is measured from request start until the response headers
    /// arrived. The response body is never read; the response is dropped
    /// before returning, which releases the connection on every path.
    #[instrument(skip(self))]
    pub async fn probe_with_timeout(&self, endpoint: &str, timeout: Duration) -> ProbeResult {
        let url = match parse_endpoint(endpoint) {
            Ok(url) => url,
            Err(e) => {
                warn!("{e}");
                return ProbeResult::failure(endpoint, e);
            }
        };

        let timestamp = Utc::now();
        let start = Instant::now();

        let request = self.client.get(url).timeout(timeout).send();

        let result = match tokio::time::timeout(timeout, request).await {
            Ok(Ok(response)) => {
                let latency = start.elapsed();
                let status_code = response.status().as_u16();
                drop(response);

                trace!("{endpoint}: {status_code} in {latency:?}");
                ProbeResult::success(endpoint, status_code, latency)
            }
            Ok(Err(e)) if e.is_timeout() => ProbeResult::failure(endpoint, ProbeError::Timeout(timeout)),
            Ok(Err(e)) => ProbeResult::failure(endpoint, ProbeError::Transport(e.to_string())),
            Err(_) => ProbeResult::failure(endpoint, ProbeError::Timeout(timeout)),
        };

        if let Some(e) = &result.error {
            warn!("{endpoint}: {e}");
        }

        ProbeResult { timestamp, ..result }
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url, ProbeError> {
    let url = Url::parse(endpoint).map_err(|e| ProbeError::InvalidRequest(format!("{endpoint}: {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ProbeError::InvalidRequest(format!(
            "{endpoint}: unsupported scheme '{scheme}'"
        ))),
    }
}
