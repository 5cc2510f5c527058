use std::sync::Arc;

use crate::cache::{CacheKey, CachePolicy, Invalidation, Invalidator, ReadThrough};
use crate::domain::{Actor, Article, ArticleDraft, ArticlePage, PageRequest};
use crate::error::DomainError;
use crate::ports::{ArticleRepository, Job, JobPayload, JobQueue};

use super::{or_not_found, require_admin};

/// Size of the hot list.
pub const HOT_ARTICLES_LIMIT: u64 = 10;

/// Counts article views off the request path.
#[derive(Clone)]
pub struct ViewRecorder {
    queue: Arc<dyn JobQueue>,
}

impl ViewRecorder {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }

    /// Queue one `views_count + 1`. A full queue drops the view.
    pub fn record(&self, article_id: i64) {
        if let Err(e) = self
            .queue
            .enqueue(Job::new(JobPayload::RecordView { article_id }))
        {
            tracing::warn!(article_id, error = %e, "View not recorded");
        }
    }
}

#[derive(Clone)]
pub struct ArticleService {
    repo: Arc<dyn ArticleRepository>,
    cache: ReadThrough,
    invalidator: Invalidator,
    views: ViewRecorder,
    policy: CachePolicy,
}

impl ArticleService {
    pub fn new(
        repo: Arc<dyn ArticleRepository>,
        cache: ReadThrough,
        invalidator: Invalidator,
        views: ViewRecorder,
        policy: CachePolicy,
    ) -> Self {
        Self {
            repo,
            cache,
            invalidator,
            views,
            policy,
        }
    }

    /// One page of live articles, newest first.
    pub async fn list(
        &self,
        category_id: Option<i64>,
        page: PageRequest,
    ) -> Result<ArticlePage, DomainError> {
        let key = CacheKey::ArticleList { category_id, page };
        self.cache
            .get_or_load(&key, self.policy.content_ttl, move || async move {
                self.repo.list(category_id, page).await.map_err(DomainError::from)
            })
            .await
    }

    /// The article, with this read already counted in `views_count`.
    ///
    /// The durable increment happens on the job queue; the cached entry keeps
    /// the count as of its last load.
    pub async fn detail(&self, id: i64) -> Result<Article, DomainError> {
        let mut article = self
            .cache
            .get_or_load(
                &CacheKey::ArticleDetail(id),
                self.policy.content_ttl,
                move || async move {
                    self.repo
                        .find_by_id(id)
                        .await?
                        .ok_or_else(|| DomainError::not_found("article", id))
                },
            )
            .await?;

        self.views.record(id);
        article.views_count += 1;
        Ok(article)
    }

    /// Most viewed live articles.
    pub async fn hot(&self) -> Result<Vec<Article>, DomainError> {
        self.cache
            .get_or_load(&CacheKey::HotArticles, self.policy.content_ttl, move || async move {
                self.repo.hot(HOT_ARTICLES_LIMIT).await.map_err(DomainError::from)
            })
            .await
    }

    pub async fn create(&self, actor: &Actor, draft: ArticleDraft) -> Result<Article, DomainError> {
        require_admin(actor)?;
        draft.validate()?;

        let article = self.repo.create(actor.user_id, draft).await?;
        tracing::info!(article_id = article.id, author_id = actor.user_id, "Article created");

        self.invalidator.dispatch(Invalidation::articles_changed()).await;
        Ok(article)
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: i64,
        draft: ArticleDraft,
    ) -> Result<Article, DomainError> {
        require_admin(actor)?;
        draft.validate()?;

        let article = self
            .repo
            .update(id, draft)
            .await
            .map_err(or_not_found("article", id))?;
        tracing::info!(article_id = id, "Article updated");

        self.invalidator.dispatch(Invalidation::article_changed(id)).await;
        Ok(article)
    }

    /// Soft-delete the article; its comments, likes and favorites go with it.
    pub async fn delete(&self, actor: &Actor, id: i64) -> Result<(), DomainError> {
        require_admin(actor)?;

        self.repo
            .delete_cascade(id)
            .await
            .map_err(or_not_found("article", id))?;
        tracing::info!(article_id = id, "Article deleted");

        self.invalidator.dispatch(Invalidation::article_removed(id)).await;
        Ok(())
    }
}
