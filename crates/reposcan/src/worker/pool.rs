use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::pipeline::ScanPipeline;
use crate::worker::job::{ScanJob, ScanOutcome};
use crate::worker::queue::ScanQueue;

/// Fixed set of worker tasks pulling from a [`ScanQueue`].
///
/// Workers stop claiming once [`WorkerPool::shutdown`] is called; a job that
/// is already running is allowed to finish.
pub struct WorkerPool {
    queue: ScanQueue,
    result_receiver: Receiver<ScanOutcome>,
    workers: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl WorkerPool {
    /// Spawns `worker_count` workers on the current tokio runtime.
    ///
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn start(
        queue: ScanQueue,
        pipeline: Arc<ScanPipeline>,
        worker_count: usize,
        poll_interval: Duration,
    ) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        let (result_sender, result_receiver) = mpsc::channel::<ScanOutcome>(worker_count * 2);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let handle = tokio::spawn(run_worker(
                worker_id as i64,
                queue.clone(),
                Arc::clone(&pipeline),
                result_sender.clone(),
                shutdown_rx.clone(),
                poll_interval,
            ));
            workers.push(handle);
        }

        info!("Started {} scan workers", worker_count);

        Self {
            queue,
            result_receiver,
            workers,
            shutdown,
        }
    }

    pub fn queue(&self) -> &ScanQueue {
        &self.queue
    }

    pub fn try_recv_result(&mut self) -> Option<ScanOutcome> {
        self.result_receiver.try_recv().ok()
    }

    /// Next outcome, or `None` once every worker has stopped.
    pub async fn recv_result(&mut self) -> Option<ScanOutcome> {
        self.result_receiver.recv().await
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        // The flag is sticky, so a worker that is not waiting yet still sees it.
        self.shutdown.send_replace(true);
        self.queue.wake_all();
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Waits for every worker to stop. Call [`WorkerPool::shutdown`] first.
    pub async fn wait(self) {
        // Unblock workers stuck sending results nobody will read.
        drop(self.result_receiver);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.await {
                error!("Worker {} panicked: {}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

async fn run_worker(
    worker_id: i64,
    queue: ScanQueue,
    pipeline: Arc<ScanPipeline>,
    result_sender: Sender<ScanOutcome>,
    mut shutdown: watch::Receiver<bool>,
    poll_interval: Duration,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if *shutdown.borrow() {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        let job = match queue.claim_next(worker_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tokio::select! {
                    _ = queue.wait_for_work(poll_interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            debug!("Worker {} lost its pool", worker_id);
                            break;
                        }
                    }
                }
                continue;
            }
            Err(e) => {
                error!("Worker {} failed to claim a job: {}", worker_id, e);
                tokio::time::sleep(poll_interval).await;
                continue;
            }
        };

        let outcome = execute_job(&pipeline, job).await;
        record_outcome(worker_id, &queue, &outcome).await;

        if result_sender.send(outcome).await.is_err() {
            debug!("Worker {} result receiver dropped", worker_id);
        }
    }

    debug!("Worker {} stopped", worker_id);
}

/// Runs the pipeline in its own task so a panic fails the job instead of
/// killing the worker.
async fn execute_job(pipeline: &Arc<ScanPipeline>, job: ScanJob) -> ScanOutcome {
    let task_pipeline = Arc::clone(pipeline);
    let task_job = job.clone();
    match tokio::spawn(async move { task_pipeline.run(&task_job).await }).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Scan {} of {} panicked: {}", job.id, job.repository_id, e);
            ScanOutcome::failure(&job, format!("scan task failed: {}", e))
        }
    }
}

async fn record_outcome(worker_id: i64, queue: &ScanQueue, outcome: &ScanOutcome) {
    let recorded = if outcome.success {
        queue.complete(&outcome.job_id).await
    } else {
        let error = outcome.error.as_deref().unwrap_or("unknown error");
        queue.fail(&outcome.job_id, error).await
    };

    match recorded {
        Ok(true) => {}
        Ok(false) => debug!(
            "Worker {}: scan {} was no longer running",
            worker_id, outcome.job_id
        ),
        Err(e) => error!(
            "Worker {} failed to record outcome of scan {} ({}): {}",
            worker_id, outcome.job_id, outcome.repository_id, e
        ),
    }
}
