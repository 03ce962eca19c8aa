//! Test helpers shared by the integration tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use health_monitor::aggregator::MetricsSnapshot;
use health_monitor::config::ResolvedConfig;
use health_monitor::reporter::Reporter;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Reporter that keeps every snapshot it was handed
#[derive(Clone, Default)]
pub struct RecordingReporter {
    reports: Arc<Mutex<Vec<MetricsSnapshot>>>,
}

impl RecordingReporter {
    pub fn reports(&self) -> Vec<MetricsSnapshot> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl Reporter for RecordingReporter {
    async fn report(&self, metrics: &MetricsSnapshot) -> Result<()> {
        self.reports.lock().unwrap().push(metrics.clone());
        Ok(())
    }
}

pub fn create_test_config(
    services: Vec<String>,
    concurrency: usize,
    interval_ms: u64,
    timeout_ms: u64,
) -> ResolvedConfig {
    ResolvedConfig {
        ping_interval: Duration::from_millis(interval_ms),
        concurrency,
        request_timeout: Duration::from_millis(timeout_ms),
        services,
    }
}

/// Mount a GET handler on `route` answering with `status` after `delay_ms`
pub async fn mount_endpoint(server: &MockServer, route: &str, status: u16, delay_ms: u64) -> String {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_delay(Duration::from_millis(delay_ms)))
        .mount(server)
        .await;

    format!("{}{route}", server.uri())
}
