//! Orchestrator - drives the probe cycle
//!
//! ## Lifecycle
//!
//! ```text
//! Running ──shutdown──► Draining ──workers + consumer done──► Stopped
//!    │
//!    └── tick: enqueue all endpoints → recompute average → report snapshot
//! ```
//!
//! Ticks and the shutdown signal are awaited together; if both are ready the
//! shutdown wins and no further tick is processed. Cycles may overlap: a tick
//! does not wait for the previous round of probes to finish, it only blocks
//! while the job queue is full. The shutdown signal is still observed while
//! blocked on the queue.
//!
//! Ticks stay on their original schedule: ticks missed while a dispatch was
//! blocked are skipped, not replayed late.

use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, instrument, warn};

use crate::aggregator::{self, AggregatedMetrics};
use crate::config::ResolvedConfig;
use crate::pool::WorkerPool;
use crate::prober::Prober;
use crate::reporter::Reporter;
use crate::Endpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Running,
    Draining,
    Stopped,
}

pub struct Orchestrator {
    config: ResolvedConfig,
    prober: Prober,
    metrics: Arc<AggregatedMetrics>,
    reporter: Arc<dyn Reporter>,
    state_tx: watch::Sender<OrchestratorState>,
}

impl Orchestrator {
    pub fn new(config: ResolvedConfig, reporter: Arc<dyn Reporter>) -> Result<Self> {
        let prober = Prober::new(config.request_timeout)?;
        let (state_tx, _) = watch::channel(OrchestratorState::Running);

        Ok(Self {
            config,
            prober,
            metrics: Arc::new(AggregatedMetrics::new()),
            reporter,
            state_tx,
        })
    }

    /// Shared metrics, valid for the whole lifetime of the process
    pub fn metrics(&self) -> Arc<AggregatedMetrics> {
        self.metrics.clone()
    }

    /// Observe state transitions
    pub fn subscribe(&self) -> watch::Receiver<OrchestratorState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> OrchestratorState {
        *self.state_tx.borrow()
    }

    /// Run until `shutdown` completes, then drain and stop
    ///
    /// Returns the number of completed ticks, i.e. ticks that enqueued every
    /// endpoint and reported. A tick cut short by shutdown is not counted.
    /// When this returns, every dispatched probe has finished and been
    /// recorded.
    #[instrument(skip_all)]
    pub async fn run<S>(self, shutdown: S) -> u64
    where
        S: Future<Output = ()>,
    {
        let concurrency = self.config.concurrency;
        let period = self.config.ping_interval;

        info!(
            "monitoring {} endpoints every {period:?} with {concurrency} workers",
            self.config.services.len()
        );

        let (job_tx, job_rx) = mpsc::channel(concurrency);
        let (result_tx, result_rx) = mpsc::channel(concurrency);

        let pool = WorkerPool::spawn(concurrency, self.prober.clone(), job_rx, result_tx);
        let consumer = aggregator::spawn_consumer(self.metrics.clone(), result_rx);

        let mut ticker = ticker(period);

        tokio::pin!(shutdown);
        let mut ticks = 0;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.as_mut() => {
                    info!("received shutdown signal, stopping the health monitor");
                    break;
                }

                _ = ticker.tick() => {
                    debug!("tick {}", ticks + 1);

                    if self.dispatch(&job_tx, &mut shutdown).await.is_break() {
                        break;
                    }

                    self.metrics.recompute_average();
                    let snapshot = self.metrics.snapshot();
                    if let Err(e) = self.reporter.report(&snapshot).await {
                        error!("failed to report metrics: {e:#}");
                    }

                    ticks += 1;
                }
            }
        }

        self.drain(job_tx, pool, consumer).await;

        info!(
            "health monitor gracefully shut down after {ticks} ticks ({} checks recorded)",
            self.metrics.total_checks()
        );

        ticks
    }

    /// Enqueue every configured endpoint, giving up if shutdown is requested
    /// while waiting for queue capacity.
    async fn dispatch<S>(
        &self,
        jobs: &mpsc::Sender<Endpoint>,
        shutdown: &mut Pin<&mut S>,
    ) -> ControlFlow<()>
    where
        S: Future<Output = ()>,
    {
        for (sent, endpoint) in self.config.services.iter().enumerate() {
            tokio::select! {
                biased;

                _ = shutdown.as_mut() => {
                    warn!(
                        "shutdown requested during dispatch, {} endpoints not enqueued",
                        self.config.services.len() - sent
                    );
                    return ControlFlow::Break(());
                }

                result = jobs.send(endpoint.clone()) => {
                    if result.is_err() {
                        error!("job queue closed unexpectedly");
                        return ControlFlow::Break(());
                    }
                }
            }
        }

        ControlFlow::Continue(())
    }

    async fn drain(
        &self,
        jobs: mpsc::Sender<Endpoint>,
        pool: WorkerPool,
        consumer: JoinHandle<()>,
    ) {
        self.state_tx.send_replace(OrchestratorState::Draining);
        debug!("closing job queue, waiting for {} workers", pool.size());

        drop(jobs);
        pool.join().await;

        // the pool held the last result senders, so the consumer finishes now
        if let Err(e) = consumer.await {
            error!("result consumer terminated abnormally: {e}");
        }

        self.state_tx.send_replace(OrchestratorState::Stopped);
    }
}

/// First tick one period after start; missed ticks are skipped so the
/// schedule never drifts.
fn ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}
