//! Core services - business logic orchestrating the ports.
//!
//! Every service is built once at startup from [`Stores`] and shared behind
//! the application state.

mod articles;
mod categories;
mod comments;
mod engagement;
mod jobs;
mod rates;

use std::sync::Arc;

pub use articles::{ArticleService, HOT_ARTICLES_LIMIT, ViewRecorder};
pub use categories::CategoryService;
pub use comments::CommentService;
pub use engagement::EngagementService;
pub use jobs::JobRunner;
pub use rates::{RateConfig, RateService, RefreshError, RefreshReport};

use crate::cache::{CachePolicy, Invalidator, ReadThrough};
use crate::domain::Actor;
use crate::error::{DomainError, RepoError};
use crate::ports::{
    ArticleRepository, CategoryRepository, CommentRepository, ExchangeRateRepository,
    FastStore, FavoriteRepository, JobQueue, LikeRepository, RateSource, UserRepository,
};

/// The backends a service set is built from.
#[derive(Clone)]
pub struct Stores {
    pub articles: Arc<dyn ArticleRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub likes: Arc<dyn LikeRepository>,
    pub favorites: Arc<dyn FavoriteRepository>,
    pub categories: Arc<dyn CategoryRepository>,
    pub rates: Arc<dyn ExchangeRateRepository>,
    pub users: Arc<dyn UserRepository>,
    pub fast: Arc<dyn FastStore>,
    pub queue: Arc<dyn JobQueue>,
}

/// Every core service, wired to one set of stores.
#[derive(Clone)]
pub struct Services {
    pub articles: ArticleService,
    pub categories: CategoryService,
    pub comments: CommentService,
    pub engagement: EngagementService,
    pub rates: RateService,
    pub invalidator: Invalidator,
    pub jobs: Arc<JobRunner>,
}

impl Services {
    pub fn new(
        stores: Stores,
        policy: CachePolicy,
        rate_config: RateConfig,
        rate_source: Arc<dyn RateSource>,
    ) -> Self {
        let cache = ReadThrough::new(stores.fast.clone());
        let invalidator = Invalidator::new(
            stores.fast.clone(),
            stores.queue.clone(),
            policy.invalidation,
            policy.scan_batch,
        );
        let views = ViewRecorder::new(stores.queue.clone());

        Self {
            articles: ArticleService::new(
                stores.articles.clone(),
                cache.clone(),
                invalidator.clone(),
                views,
                policy.clone(),
            ),
            categories: CategoryService::new(
                stores.categories.clone(),
                cache.clone(),
                invalidator.clone(),
                policy.clone(),
            ),
            comments: CommentService::new(
                stores.comments.clone(),
                stores.articles.clone(),
                stores.users.clone(),
                cache,
                invalidator.clone(),
                policy.clone(),
            ),
            engagement: EngagementService::new(
                stores.likes.clone(),
                stores.favorites.clone(),
                stores.articles.clone(),
                stores.fast.clone(),
                invalidator.clone(),
                policy,
            ),
            rates: RateService::new(rate_source, stores.rates.clone(), stores.fast.clone(), rate_config),
            jobs: Arc::new(JobRunner::new(invalidator.clone(), stores.articles)),
            invalidator,
        }
    }
}

/// Map a repository `NotFound` to a typed domain `NotFound`.
pub(crate) fn or_not_found(
    entity: &'static str,
    id: impl ToString,
) -> impl FnOnce(RepoError) -> DomainError {
    move |err| match err {
        RepoError::NotFound => DomainError::not_found(entity, id),
        other => other.into(),
    }
}

pub(crate) fn require_admin(actor: &Actor) -> Result<(), DomainError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(DomainError::Forbidden("admin role required".to_string()))
    }
}
