//! In-memory job queue implementation.
//!
//! A bounded channel drained by a fixed set of worker tasks. Enqueueing never
//! waits: a full queue rejects the job. Jobs are lost on restart.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use postrate_core::ports::{Job, JobHandler, JobQueue, JobQueueError, JobResult, QueueStats};

/// In-memory job queue configuration.
#[derive(Debug, Clone)]
pub struct InMemoryJobQueueConfig {
    /// Maximum number of queued jobs.
    pub max_size: usize,
    /// Number of worker tasks.
    pub workers: usize,
    /// Delay before a retry, multiplied by the attempt number.
    pub retry_backoff: Duration,
}

impl Default for InMemoryJobQueueConfig {
    fn default() -> Self {
        Self {
            max_size: 10000,
            workers: 4,
            retry_backoff: Duration::from_millis(100),
        }
    }
}

impl InMemoryJobQueueConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_size: std::env::var("JOB_QUEUE_MAX_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            workers: std::env::var("JOB_QUEUE_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.workers),
            retry_backoff: defaults.retry_backoff,
        }
    }
}

#[derive(Default)]
struct JobStats {
    pending: AtomicUsize,
    processing: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

/// In-memory job queue.
pub struct InMemoryJobQueue {
    stats: Arc<JobStats>,
    config: InMemoryJobQueueConfig,
    job_sender: mpsc::Sender<Job>,
    job_receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
}

impl InMemoryJobQueue {
    pub fn new(config: InMemoryJobQueueConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.max_size.max(1));

        Self {
            stats: Arc::new(JobStats::default()),
            config,
            job_sender: tx,
            job_receiver: Arc::new(Mutex::new(rx)),
        }
    }

    pub fn from_env() -> Self {
        Self::new(InMemoryJobQueueConfig::from_env())
    }

    /// Spawn the worker tasks. Each worker exits once `shutdown` flips to
    /// `true`, after finishing the job it is currently running.
    pub fn start_workers(
        &self,
        handler: JobHandler,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<JoinHandle<()>> {
        let handler = Arc::new(handler);

        (0..self.config.workers.max(1))
            .map(|worker_id| {
                let worker = Worker {
                    id: worker_id,
                    handler: handler.clone(),
                    receiver: self.job_receiver.clone(),
                    sender: self.job_sender.clone(),
                    stats: self.stats.clone(),
                    retry_backoff: self.config.retry_backoff,
                };
                tokio::spawn(worker.run(shutdown.clone()))
            })
            .collect()
    }
}

struct Worker {
    id: usize,
    handler: Arc<JobHandler>,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    sender: mpsc::Sender<Job>,
    stats: Arc<JobStats>,
    retry_backoff: Duration,
}

impl Worker {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Job worker {} started", self.id);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let job = tokio::select! {
                job = async {
                    let mut rx = self.receiver.lock().await;
                    rx.recv().await
                } => job,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // Sender dropped: treat as shutdown.
                        break;
                    }
                    continue;
                }
            };

            match job {
                Some(job) => self.process(job).await,
                None => break,
            }
        }

        tracing::info!("Job worker {} shutting down", self.id);
    }

    async fn process(&self, mut job: Job) {
        self.stats.pending.fetch_sub(1, Ordering::Relaxed);
        self.stats.processing.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            worker = self.id,
            job_id = %job.id,
            job_type = job.job_type(),
            "Processing job"
        );

        job.attempts += 1;
        let result = (self.handler)(job.clone()).await;

        self.stats.processing.fetch_sub(1, Ordering::Relaxed);

        match result {
            JobResult::Success => {
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(job_id = %job.id, "Job completed successfully");
            }
            JobResult::Retry(reason) if job.attempts < job.max_attempts => {
                tracing::warn!(
                    job_id = %job.id,
                    job_type = job.job_type(),
                    attempt = job.attempts,
                    max_attempts = job.max_attempts,
                    reason = %reason,
                    "Job failed, will retry"
                );
                self.stats.pending.fetch_add(1, Ordering::Relaxed);
                let sender = self.sender.clone();
                let stats = self.stats.clone();
                let delay = self.retry_backoff * job.attempts;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(e) = sender.try_send(job) {
                        stats.pending.fetch_sub(1, Ordering::Relaxed);
                        stats.failed.fetch_add(1, Ordering::Relaxed);
                        tracing::error!("Failed to re-enqueue job for retry: {}", e);
                    }
                });
            }
            JobResult::Retry(reason) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(job_id = %job.id, reason = %reason, "Job failed after max retries");
            }
            JobResult::Failed(reason) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(job_id = %job.id, reason = %reason, "Job failed permanently");
            }
        }
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    fn enqueue(&self, job: Job) -> Result<(), JobQueueError> {
        // Count first so a fast worker never decrements below zero.
        self.stats.pending.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.job_sender.try_send(job) {
            self.stats.pending.fetch_sub(1, Ordering::Relaxed);
            return Err(match e {
                mpsc::error::TrySendError::Full(_) => JobQueueError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => JobQueueError::Closed,
            });
        }

        tracing::debug!(
            "Job enqueued. Queue size: {}",
            self.stats.pending.load(Ordering::Relaxed)
        );

        Ok(())
    }

    async fn stats(&self) -> Result<QueueStats, JobQueueError> {
        Ok(QueueStats {
            pending: self.stats.pending.load(Ordering::Relaxed),
            processing: self.stats.processing.load(Ordering::Relaxed),
            completed: self.stats.completed.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
        })
    }
}
