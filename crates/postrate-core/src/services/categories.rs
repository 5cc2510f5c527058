use std::sync::Arc;

use crate::cache::{CacheKey, CachePolicy, Invalidation, Invalidator, ReadThrough};
use crate::domain::{Actor, Category};
use crate::error::{DomainError, RepoError};
use crate::ports::CategoryRepository;

use super::{or_not_found, require_admin};

#[derive(Clone)]
pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
    cache: ReadThrough,
    invalidator: Invalidator,
    policy: CachePolicy,
}

impl CategoryService {
    pub fn new(
        repo: Arc<dyn CategoryRepository>,
        cache: ReadThrough,
        invalidator: Invalidator,
        policy: CachePolicy,
    ) -> Self {
        Self {
            repo,
            cache,
            invalidator,
            policy,
        }
    }

    pub async fn list(&self) -> Result<Vec<Category>, DomainError> {
        self.cache
            .get_or_load(&CacheKey::Categories, self.policy.content_ttl, move || async move {
                self.repo.list().await.map_err(DomainError::from)
            })
            .await
    }

    pub async fn create(&self, actor: &Actor, name: &str) -> Result<Category, DomainError> {
        require_admin(actor)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("category name is required"));
        }

        let category = self.repo.create(name).await.map_err(|e| match e {
            RepoError::Constraint(_) => {
                DomainError::Duplicate(format!("category '{name}' already exists"))
            }
            other => other.into(),
        })?;

        self.invalidator.dispatch(Invalidation::categories_changed()).await;
        Ok(category)
    }

    /// Articles in the category keep their (now dangling) category id, so the
    /// article lists are dropped as well.
    pub async fn delete(&self, actor: &Actor, id: i64) -> Result<(), DomainError> {
        require_admin(actor)?;

        self.repo
            .delete(id)
            .await
            .map_err(or_not_found("category", id))?;

        self.invalidator
            .dispatch(Invalidation::categories_changed().merge(Invalidation::articles_changed()))
            .await;
        Ok(())
    }
}
