//! Worker pool - a fixed set of tasks executing probes
//!
//! ## Message Flow
//!
//! ```text
//! job queue (bounded) → worker 1..N → Prober → result queue (bounded) → consumer
//! ```
//!
//! Both queues have a fixed capacity. A full result queue stalls workers on
//! send, which stalls job consumption, which in turn stalls the producer.
//!
//! Workers exit once the job queue is closed and drained. An in-flight probe
//! is always finished and its result sent before a worker exits.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, trace, warn};

use crate::prober::Prober;
use crate::{Endpoint, ProbeResult};

/// Job queue receiver shared by all workers
type SharedJobs = Arc<Mutex<mpsc::Receiver<Endpoint>>>;

pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers pulling from `jobs` and pushing into `results`
    ///
    /// The pool owns the only result senders; once every worker has exited
    /// the result queue is closed.
    pub fn spawn(
        size: usize,
        prober: Prober,
        jobs: mpsc::Receiver<Endpoint>,
        results: mpsc::Sender<ProbeResult>,
    ) -> Self {
        let jobs: SharedJobs = Arc::new(Mutex::new(jobs));

        let workers = (0..size)
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    prober.clone(),
                    jobs.clone(),
                    results.clone(),
                ))
            })
            .collect();

        debug!("spawned {size} workers");

        Self { workers }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Wait until every worker has terminated
    ///
    /// Only returns after the job queue was closed and drained.
    pub async fn join(self) {
        for (id, outcome) in join_all(self.workers).await.into_iter().enumerate() {
            if let Err(e) = outcome {
                error!("worker {id} terminated abnormally: {e}");
            }
        }
    }
}

#[instrument(skip(prober, jobs, results))]
async fn worker(
    id: usize,
    prober: Prober,
    jobs: SharedJobs,
    results: mpsc::Sender<ProbeResult>,
) {
    trace!("worker started");

    loop {
        // the lock is only held while waiting for the next job, never during a probe
        let job = jobs.lock().await.recv().await;

        let Some(endpoint) = job else {
            break;
        };

        let result = prober.probe(&endpoint).await;

        if results.send(result).await.is_err() {
            warn!("result queue closed, dropping result for {endpoint}");
            break;
        }
    }

    trace!("job queue drained, worker stopped");
}
