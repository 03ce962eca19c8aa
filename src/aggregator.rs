//! Aggregator - concurrency-safe accumulation of probe results
//!
//! [`AggregatedMetrics`] is created once per process and shared by reference
//! between the result consumer and the orchestrator. It is never reset.
//!
//! ## Synchronization
//!
//! - Scalar counters are lock-free atomics
//! - The per-endpoint table sits behind an internal `RwLock`; each entry is
//!   replaced as a whole, so readers never see status and latency from two
//!   different results
//!
//! Callers never acquire a lock themselves.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, trace};

use crate::{Endpoint, ProbeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Up,
    Down,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Up => write!(f, "UP"),
            Status::Down => write!(f, "DOWN"),
        }
    }
}

/// Latest known state of one endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub status: Status,

    /// Zero when the endpoint is down
    #[serde(serialize_with = "serialize_millis")]
    pub latency: Duration,

    pub status_code: Option<u16>,

    pub last_checked: DateTime<Utc>,
}

impl From<&ProbeResult> for ServiceStatus {
    fn from(result: &ProbeResult) -> Self {
        if result.is_success() {
            ServiceStatus {
                status: Status::Up,
                latency: result.latency,
                status_code: result.status_code,
                last_checked: result.timestamp,
            }
        } else {
            ServiceStatus {
                status: Status::Down,
                latency: Duration::ZERO,
                status_code: None,
                last_checked: result.timestamp,
            }
        }
    }
}

/// Running counters plus the per-endpoint status table
#[derive(Debug, Default)]
pub struct AggregatedMetrics {
    total_checks: AtomicU64,
    successful_pings: AtomicU64,
    failed_pings: AtomicU64,

    /// Sum of successful latencies in nanoseconds
    total_latency_ns: AtomicU64,

    /// Only written by [`AggregatedMetrics::recompute_average`]
    average_latency_ns: AtomicU64,

    service_status: RwLock<HashMap<Endpoint, ServiceStatus>>,
}

impl AggregatedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one probe result into the metrics. Safe to call from any number
    /// of tasks at once.
    pub fn record_result(&self, result: &ProbeResult) {
        if result.is_success() {
            self.successful_pings.fetch_add(1, Ordering::Relaxed);
            self.total_latency_ns
                .fetch_add(duration_to_nanos(result.latency), Ordering::Relaxed);
        } else {
            self.failed_pings.fetch_add(1, Ordering::Relaxed);
        }

        self.service_status
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(result.endpoint.clone(), ServiceStatus::from(result));

        self.total_checks.fetch_add(1, Ordering::Release);
    }

    /// `total_latency / successful_pings`, truncated; zero without successes.
    ///
    /// Must not be called concurrently with itself.
    pub fn recompute_average(&self) {
        let successful = self.successful_pings.load(Ordering::Acquire);
        let average = self
            .total_latency_ns
            .load(Ordering::Acquire)
            .checked_div(successful)
            .unwrap_or(0);
        self.average_latency_ns.store(average, Ordering::Release);
    }

    pub fn total_checks(&self) -> u64 {
        self.total_checks.load(Ordering::Acquire)
    }

    pub fn successful_pings(&self) -> u64 {
        self.successful_pings.load(Ordering::Acquire)
    }

    pub fn failed_pings(&self) -> u64 {
        self.failed_pings.load(Ordering::Acquire)
    }

    pub fn total_latency(&self) -> Duration {
        Duration::from_nanos(self.total_latency_ns.load(Ordering::Acquire))
    }

    /// Value as of the last [`AggregatedMetrics::recompute_average`] call
    pub fn average_latency(&self) -> Duration {
        Duration::from_nanos(self.average_latency_ns.load(Ordering::Acquire))
    }

    pub fn service_status(&self, endpoint: &str) -> Option<ServiceStatus> {
        self.service_status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(endpoint)
            .cloned()
    }

    /// Read-only copy handed to reporters
    pub fn snapshot(&self) -> MetricsSnapshot {
        let services = self
            .service_status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(endpoint, status)| (endpoint.clone(), status.clone()))
            .collect();

        MetricsSnapshot {
            taken_at: Utc::now(),
            total_checks: self.total_checks(),
            successful_pings: self.successful_pings(),
            failed_pings: self.failed_pings(),
            total_latency: self.total_latency(),
            average_latency: self.average_latency(),
            services,
        }
    }
}

/// Point-in-time view of [`AggregatedMetrics`]
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub taken_at: DateTime<Utc>,
    pub total_checks: u64,
    pub successful_pings: u64,
    pub failed_pings: u64,
    #[serde(serialize_with = "serialize_millis")]
    pub total_latency: Duration,
    #[serde(serialize_with = "serialize_millis")]
    pub average_latency: Duration,
    pub services: BTreeMap<Endpoint, ServiceStatus>,
}

fn duration_to_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

fn serialize_millis<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_nanos() as f64 / 1_000_000.0)
}

/// Spawn the task that drains the result queue into `metrics`
///
/// The task ends once every sender of the result queue is dropped and the
/// queue is empty, so awaiting the handle guarantees every produced result
/// was recorded.
pub fn spawn_consumer(
    metrics: Arc<AggregatedMetrics>,
    results: mpsc::Receiver<ProbeResult>,
) -> JoinHandle<()> {
    tokio::spawn(consume(metrics, results))
}

#[instrument(skip_all)]
async fn consume(metrics: Arc<AggregatedMetrics>, mut results: mpsc::Receiver<ProbeResult>) {
    debug!("starting result consumer");

    while let Some(result) = results.recv().await {
        trace!("recording result for {}", result.endpoint);
        metrics.record_result(&result);
    }

    debug!("result queue closed, consumer stopped");
}
