//! Reporters consume a read-only [`MetricsSnapshot`] once per tick
//!
//! The orchestrator only knows the [`Reporter`] trait, so further outputs
//! (metrics export, webhooks, ...) can be added without touching the core.

use std::fmt;
use std::io::Write;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::aggregator::MetricsSnapshot;

const SEPARATOR: &str = "--------------------------------------------------";

#[async_trait]
pub trait Reporter: Send + Sync {
    async fn report(&self, metrics: &MetricsSnapshot) -> Result<()>;
}

/// Human readable report on stdout
#[derive(Debug, Default, Clone)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn render(metrics: &MetricsSnapshot) -> String {
        ConsoleReport(metrics).to_string()
    }
}

struct ConsoleReport<'a>(&'a MetricsSnapshot);

impl fmt::Display for ConsoleReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let metrics = self.0;

        writeln!(f, "{SEPARATOR}")?;
        writeln!(
            f,
            "Health Monitor Report ({})",
            metrics.taken_at.format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(f, "{SEPARATOR}")?;

        writeln!(f, "Total Checks: {}", metrics.total_checks)?;
        writeln!(f, "Successful Pings: {}", metrics.successful_pings)?;
        writeln!(f, "Failed Pings: {}", metrics.failed_pings)?;
        writeln!(f, "Average Latency: {:?}", metrics.average_latency)?;

        writeln!(f, "{SEPARATOR}")?;
        writeln!(f, "Service Status:")?;

        for (endpoint, status) in &metrics.services {
            write!(
                f,
                "  - {} | Status: {} | Latency: {:?}",
                endpoint, status.status, status.latency
            )?;
            if let Some(code) = status.status_code {
                write!(f, " | HTTP {code}")?;
            }
            writeln!(f)?;
        }

        writeln!(f, "{SEPARATOR}")
    }
}

#[async_trait]
impl Reporter for ConsoleReporter {
    async fn report(&self, metrics: &MetricsSnapshot) -> Result<()> {
        let rendered = Self::render(metrics);
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(rendered.as_bytes())
            .and_then(|_| stdout.flush())
            .context("failed to write report to stdout")
    }
}

/// One JSON document per line on stdout
#[derive(Debug, Default, Clone)]
pub struct JsonReporter;

#[async_trait]
impl Reporter for JsonReporter {
    async fn report(&self, metrics: &MetricsSnapshot) -> Result<()> {
        let line = serde_json::to_string(metrics).context("failed to serialize metrics")?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{line}").context("failed to write report to stdout")
    }
}
