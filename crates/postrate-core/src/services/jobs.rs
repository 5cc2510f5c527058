use std::sync::Arc;

use crate::cache::Invalidator;
use crate::error::RepoError;
use crate::ports::{ArticleRepository, Job, JobHandler, JobPayload, JobResult};

/// Executes queued jobs against the core stores.
pub struct JobRunner {
    invalidator: Invalidator,
    articles: Arc<dyn ArticleRepository>,
}

impl JobRunner {
    pub fn new(invalidator: Invalidator, articles: Arc<dyn ArticleRepository>) -> Self {
        Self {
            invalidator,
            articles,
        }
    }

    pub async fn run(&self, job: &Job) -> JobResult {
        match &job.payload {
            JobPayload::Invalidate(inv) => match self.invalidator.apply(inv).await {
                Ok(_) => JobResult::Success,
                Err(e) => JobResult::Retry(e.to_string()),
            },
            JobPayload::RecordView { article_id } => {
                match self.articles.increment_views(*article_id).await {
                    Ok(()) => JobResult::Success,
                    Err(RepoError::NotFound) => {
                        JobResult::Failed(format!("article {article_id} no longer exists"))
                    }
                    Err(e) => JobResult::Retry(e.to_string()),
                }
            }
        }
    }

    /// Adapter for queue workers.
    pub fn handler(self: &Arc<Self>) -> JobHandler {
        let runner = Arc::clone(self);
        Box::new(move |job| {
            let runner = Arc::clone(&runner);
            Box::pin(async move { runner.run(&job).await })
        })
    }
}
