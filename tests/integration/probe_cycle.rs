//! Full probe cycles through pool, aggregator and reporter

use std::sync::Arc;
use std::time::Duration;

use health_monitor::aggregator::Status;
use health_monitor::orchestrator::{Orchestrator, OrchestratorState};
use pretty_assertions::assert_eq;
use wiremock::MockServer;

use crate::helpers::*;

#[tokio::test]
async fn test_single_cycle_mixed_outcomes() {
    let mock_server = MockServer::start().await;
    let a = mount_endpoint(&mock_server, "/a", 200, 0).await;
    let b = mount_endpoint(&mock_server, "/b", 200, 5_000).await;
    let c = mount_endpoint(&mock_server, "/c", 500, 0).await;

    let config = create_test_config(vec![a.clone(), b.clone(), c.clone()], 2, 100, 200);
    let reporter = RecordingReporter::default();

    let orchestrator = Orchestrator::new(config, Arc::new(reporter.clone())).unwrap();
    let metrics = orchestrator.metrics();
    let state = orchestrator.subscribe();

    // one tick at 100ms, shutdown before the second one
    let ticks = orchestrator
        .run(tokio::time::sleep(Duration::from_millis(150)))
        .await;

    assert_eq!(ticks, 1);
    assert_eq!(*state.borrow(), OrchestratorState::Stopped);

    assert_eq!(metrics.total_checks(), 3);
    assert_eq!(metrics.successful_pings(), 2);
    assert_eq!(metrics.failed_pings(), 1);

    let status_a = metrics.service_status(&a).unwrap();
    assert_eq!(status_a.status, Status::Up);
    assert_eq!(status_a.status_code, Some(200));
    assert!(status_a.latency > Duration::ZERO);

    let status_b = metrics.service_status(&b).unwrap();
    assert_eq!(status_b.status, Status::Down);
    assert_eq!(status_b.latency, Duration::ZERO);

    let status_c = metrics.service_status(&c).unwrap();
    assert_eq!(status_c.status, Status::Up);
    assert_eq!(status_c.status_code, Some(500));
    assert!(status_c.latency > Duration::ZERO);

    assert_eq!(reporter.reports().len(), 1);
}

#[tokio::test]
async fn test_reports_accumulate_across_ticks() {
    let mock_server = MockServer::start().await;
    let a = mount_endpoint(&mock_server, "/a", 200, 0).await;
    let b = mount_endpoint(&mock_server, "/b", 503, 0).await;

    let config = create_test_config(vec![a, b], 2, 100, 500);
    let reporter = RecordingReporter::default();

    let orchestrator = Orchestrator::new(config, Arc::new(reporter.clone())).unwrap();
    let metrics = orchestrator.metrics();

    let ticks = orchestrator
        .run(tokio::time::sleep(Duration::from_millis(450)))
        .await;

    assert!(ticks >= 3, "expected at least 3 ticks, got {ticks}");
    assert_eq!(metrics.total_checks(), 2 * ticks);
    assert_eq!(metrics.failed_pings(), 0);

    let reports = reporter.reports();
    assert_eq!(reports.len() as u64, ticks);

    // counters never go backwards between reports
    for pair in reports.windows(2) {
        assert!(pair[0].total_checks <= pair[1].total_checks);
        assert!(pair[0].total_latency <= pair[1].total_latency);
    }

    // the report of a tick sees at least the completed earlier cycles
    let last = reports.last().unwrap();
    assert!(last.total_checks >= 2 * (ticks - 1));
    assert_eq!(last.total_checks, last.successful_pings + last.failed_pings);
}

#[tokio::test]
async fn test_average_latency_reported() {
    let mock_server = MockServer::start().await;
    let slow = mount_endpoint(&mock_server, "/slow", 200, 60).await;

    let config = create_test_config(vec![slow], 1, 100, 1_000);
    let reporter = RecordingReporter::default();

    let orchestrator = Orchestrator::new(config, Arc::new(reporter.clone())).unwrap();
    let metrics = orchestrator.metrics();

    // second tick at 200ms reports the first cycle's probe
    orchestrator
        .run(tokio::time::sleep(Duration::from_millis(250)))
        .await;

    let reports = reporter.reports();
    assert!(reports.len() >= 2);
    assert!(reports[1].average_latency >= Duration::from_millis(60));
    assert!(metrics.successful_pings() >= 2);
}
