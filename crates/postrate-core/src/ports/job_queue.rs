//! Job queue port - background work that requests do not wait on.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cache::Invalidation;

/// What a background job does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    /// Delete cache entries after a committed write.
    Invalidate(Invalidation),
    /// Count one view of an article in the durable store.
    RecordView { article_id: i64 },
}

/// A job that can be queued and processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub id: String,
    pub payload: JobPayload,
    /// Number of attempts made so far.
    pub attempts: u32,
    /// Maximum attempts before the job is dropped.
    pub max_attempts: u32,
    /// When the job was created.
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Job {
    pub fn new(payload: JobPayload) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            payload,
            attempts: 0,
            max_attempts: 3,
            created_at: chrono::Utc::now(),
        }
    }

    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    /// Short name used in logs.
    pub fn job_type(&self) -> &'static str {
        match self.payload {
            JobPayload::Invalidate(_) => "cache.invalidate",
            JobPayload::RecordView { .. } => "article.record_view",
        }
    }
}

/// Result of job processing.
#[derive(Debug, PartialEq, Eq)]
pub enum JobResult {
    /// Job completed successfully.
    Success,
    /// Job failed, should be retried.
    Retry(String),
    /// Job failed permanently, should not be retried.
    Failed(String),
}

/// Job handler function type.
pub type JobHandler =
    Box<dyn Fn(Job) -> Pin<Box<dyn Future<Output = JobResult> + Send>> + Send + Sync>;

/// Job queue trait - abstraction over job queue backends.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a job without waiting. A full queue rejects the job.
    fn enqueue(&self, job: Job) -> Result<(), JobQueueError>;

    /// Get queue statistics.
    async fn stats(&self) -> Result<QueueStats, JobQueueError>;
}

/// Queue statistics.
#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Job queue errors.
#[derive(Debug, thiserror::Error)]
pub enum JobQueueError {
    #[error("Failed to enqueue job: {0}")]
    EnqueueError(String),

    #[error("Queue is full")]
    QueueFull,

    #[error("Queue is shut down")]
    Closed,

    #[error("Backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_serializes_with_kind_tag() {
        let job = Job::new(JobPayload::RecordView { article_id: 7 });
        let json = serde_json::to_value(&job.payload).unwrap();
        assert_eq!(json["kind"], "record_view");
        assert_eq!(json["article_id"], 7);
        assert_eq!(job.job_type(), "article.record_view");
        assert_eq!(job.max_attempts, 3);
    }
}
