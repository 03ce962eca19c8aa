use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use tracing::{trace, warn};

use crate::Endpoint;
use crate::util::{CONCURRENCY, PING_INTERVAL_MS, REQUEST_TIMEOUT_MS, parse_override};

/// Configuration as it is stored on disk. All durations are in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct Config {
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    pub services: Vec<Endpoint>,
}

/// Fully resolved configuration consumed by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub ping_interval: Duration,
    pub concurrency: usize,
    pub request_timeout: Duration,
    pub services: Vec<Endpoint>,
}

fn default_ping_interval_ms() -> u64 {
    5000
}

fn default_concurrency() -> usize {
    4
}

fn default_request_timeout_ms() -> u64 {
    2000
}

impl Config {
    /// Replaces interval, concurrency and timeout with values from `lookup`
    /// when they are present and parseable. Invalid values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(PING_INTERVAL_MS) {
            match parse_override(&value) {
                Some(ms) => self.ping_interval_ms = ms,
                None => warn!("ignoring invalid {PING_INTERVAL_MS}={value:?}"),
            }
        }
        if let Some(value) = lookup(CONCURRENCY) {
            match parse_override(&value) {
                Some(n) => self.concurrency = n,
                None => warn!("ignoring invalid {CONCURRENCY}={value:?}"),
            }
        }
        if let Some(value) = lookup(REQUEST_TIMEOUT_MS) {
            match parse_override(&value) {
                Some(ms) => self.request_timeout_ms = ms,
                None => warn!("ignoring invalid {REQUEST_TIMEOUT_MS}={value:?}"),
            }
        }
    }

    /// Converts to duration-typed values. Milliseconds are scaled exactly
    /// once, after overrides were applied.
    pub fn resolve(self) -> anyhow::Result<ResolvedConfig> {
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        if self.ping_interval_ms == 0 {
            bail!("ping_interval_ms must be greater than 0");
        }
        if self.request_timeout_ms == 0 {
            bail!("request_timeout_ms must be greater than 0");
        }
        if self.services.is_empty() {
            bail!("no services configured");
        }

        Ok(ResolvedConfig {
            ping_interval: Duration::from_millis(self.ping_interval_ms),
            concurrency: self.concurrency,
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            services: self.services,
        })
    }
}

pub fn read_config_file(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to open config file {}", path.display()))?;
    serde_json::from_str(&file_content)
        .context("failed to decode JSON config")
        .inspect(|config| trace!("loaded config: {config:?}"))
}

/// Reads the config file, layers environment overrides on top and resolves
/// the result.
pub fn load_config<F>(path: impl AsRef<Path>, lookup: F) -> anyhow::Result<ResolvedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = read_config_file(path)?;
    config.apply_overrides(lookup);
    config.resolve()
}
