//! Interval job scheduler using tokio-cron-scheduler.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use postrate_core::services::{RateService, RefreshError};

use super::SchedulerConfig;

/// Delay before the first refresh after startup.
const STARTUP_REFRESH_DELAY: Duration = Duration::from_secs(1);

/// Job scheduler wrapper.
pub struct Scheduler {
    inner: JobScheduler,
}

impl Scheduler {
    pub async fn new() -> Result<Self, JobSchedulerError> {
        let inner = JobScheduler::new().await?;
        Ok(Self { inner })
    }

    /// Run `task` every `interval`, the first time one interval from now.
    pub async fn add_repeated<F, Fut>(
        &self,
        interval: Duration,
        task: F,
    ) -> Result<uuid::Uuid, JobSchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let job = Job::new_repeated_async(interval, move |_uuid, _lock| {
            let task = task.clone();
            Box::pin(async move {
                task().await;
            })
        })?;

        let id = self.inner.add(job).await?;
        tracing::info!(interval_secs = interval.as_secs(), job_id = %id, "Repeated job registered");
        Ok(id)
    }

    /// Add a one-shot delayed job.
    pub async fn add_one_shot<F, Fut>(
        &self,
        delay: Duration,
        task: F,
    ) -> Result<uuid::Uuid, JobSchedulerError>
    where
        F: FnOnce() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task = Arc::new(tokio::sync::Mutex::new(Some(task)));

        let job = Job::new_one_shot_async(delay, move |_uuid, _lock| {
            let task = task.clone();
            Box::pin(async move {
                if let Some(t) = task.lock().await.take() {
                    t().await;
                }
            })
        })?;

        let id = self.inner.add(job).await?;
        tracing::info!(delay_secs = delay.as_secs(), job_id = %id, "One-shot job scheduled");
        Ok(id)
    }

    pub async fn start(&self) -> Result<(), JobSchedulerError> {
        self.inner.start().await?;
        tracing::info!("Scheduler started");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), JobSchedulerError> {
        self.inner.shutdown().await?;
        tracing::info!("Scheduler stopped");
        Ok(())
    }
}

/// Schedule the exchange-rate refresh: once shortly after startup, then every
/// refresh interval. `None` when disabled or when the scheduler fails to
/// start; the server keeps serving stored rates either way.
pub async fn start_rate_refresh(config: &SchedulerConfig, rates: RateService) -> Option<Scheduler> {
    if !config.enabled {
        tracing::info!("Scheduler disabled");
        return None;
    }

    let interval = rates.config().refresh_interval;
    let task = move || {
        let rates = rates.clone();
        async move { run_refresh(&rates).await }
    };

    let started = async {
        let scheduler = Scheduler::new().await?;
        scheduler.add_repeated(interval, task.clone()).await?;
        scheduler.add_one_shot(STARTUP_REFRESH_DELAY, task).await?;
        scheduler.start().await?;
        Ok::<_, JobSchedulerError>(scheduler)
    };

    match started.await {
        Ok(scheduler) => Some(scheduler),
        Err(e) => {
            tracing::error!(error = %e, "Rate refresh scheduler failed to start");
            None
        }
    }
}

async fn run_refresh(rates: &RateService) {
    match rates.refresh().await {
        Ok(report) => tracing::debug!(
            currencies = report.currencies,
            snapshot_published = report.snapshot_published,
            "Scheduled rate refresh finished"
        ),
        Err(RefreshError::Store(e)) => {
            tracing::error!(error = %e, "Scheduled rate refresh could not store rates");
        }
        Err(e) => tracing::warn!(error = %e, "Scheduled rate refresh skipped"),
    }
}
