//! Likes, views and favorites.
//!
//! The durable store owns every count. The fast store mirrors like counts and
//! like-user sets; those mirrors are only ever adjusted when already present
//! and are otherwise rebuilt from the durable store on the next read.

use std::sync::Arc;

use crate::cache::{CacheKey, CachePolicy, Invalidation, Invalidator};
use crate::domain::{FavoriteToggle, FavoriteWithArticle, LikeSummary, LikeToggle};
use crate::error::DomainError;
use crate::ports::{ArticleRepository, FastStore, FavoriteRepository, LikeRepository, SetOp};

use super::or_not_found;

#[derive(Clone)]
pub struct EngagementService {
    likes: Arc<dyn LikeRepository>,
    favorites: Arc<dyn FavoriteRepository>,
    articles: Arc<dyn ArticleRepository>,
    fast: Arc<dyn FastStore>,
    invalidator: Invalidator,
    policy: CachePolicy,
}

impl EngagementService {
    pub fn new(
        likes: Arc<dyn LikeRepository>,
        favorites: Arc<dyn FavoriteRepository>,
        articles: Arc<dyn ArticleRepository>,
        fast: Arc<dyn FastStore>,
        invalidator: Invalidator,
        policy: CachePolicy,
    ) -> Self {
        Self {
            likes,
            favorites,
            articles,
            fast,
            invalidator,
            policy,
        }
    }

    /// Like or unlike. The durable toggle commits first; the fast-store
    /// mirrors follow and their failures never fail the request.
    pub async fn toggle_like(&self, user_id: i64, article_id: i64) -> Result<LikeToggle, DomainError> {
        let toggle = self
            .likes
            .toggle(user_id, article_id)
            .await
            .map_err(or_not_found("article", article_id))?;

        tracing::debug!(
            user_id,
            article_id,
            liked = toggle.liked,
            likes_count = toggle.likes_count,
            "Like toggled"
        );

        self.mirror_toggle(user_id, article_id, toggle).await;
        self.invalidator
            .dispatch(Invalidation::article_changed(article_id))
            .await;
        Ok(toggle)
    }

    /// Adjust the mirrors relatively, then compare them with the committed
    /// count. A mirror that disagrees was filled from a read that raced this
    /// toggle; it is dropped and rebuilt on the next read.
    async fn mirror_toggle(&self, user_id: i64, article_id: i64, toggle: LikeToggle) {
        let ttl = self.policy.likes_ttl;
        let (op, delta) = if toggle.liked {
            (SetOp::Add, 1)
        } else {
            (SetOp::Remove, -1)
        };

        let set_key = CacheKey::LikeSet(article_id).to_string();
        match self
            .fast
            .set_update_if_present(&set_key, &user_id.to_string(), op, ttl)
            .await
        {
            Ok(Some(size)) if size as i64 != toggle.likes_count => {
                self.drop_stale_mirror(&set_key, size as i64, toggle.likes_count).await;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(key = %set_key, error = %e, "Like set not updated"),
        }

        let count_key = CacheKey::LikeCount(article_id).to_string();
        // Relative, like the durable update, so interleaved toggles commute.
        match self.fast.incr_if_present(&count_key, delta, ttl).await {
            Ok(Some(count)) if count != toggle.likes_count => {
                self.drop_stale_mirror(&count_key, count, toggle.likes_count).await;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(key = %count_key, error = %e, "Like counter not updated"),
        }
    }

    async fn drop_stale_mirror(&self, key: &str, mirrored: i64, committed: i64) {
        tracing::warn!(key = %key, mirrored, committed, "Like mirror drifted, dropping it");
        if let Err(e) = self.fast.delete(&[key.to_string()]).await {
            tracing::warn!(key = %key, error = %e, "Drifted like mirror not removed");
        }
    }

    pub async fn like_count(&self, article_id: i64) -> Result<i64, DomainError> {
        let key = CacheKey::LikeCount(article_id).to_string();
        match self.fast.get(&key).await {
            Ok(Some(raw)) => match raw.parse::<i64>() {
                Ok(count) => return Ok(count),
                Err(_) => tracing::warn!(key = %key, "Discarding malformed like counter"),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!(key = %key, error = %e, "Like counter read failed"),
        }

        let article = self
            .articles
            .find_by_id(article_id)
            .await?
            .ok_or_else(|| DomainError::not_found("article", article_id))?;

        if let Err(e) = self
            .fast
            .set(&key, &article.likes_count.to_string(), Some(self.policy.likes_ttl))
            .await
        {
            tracing::warn!(key = %key, error = %e, "Like counter not repopulated");
        }
        Ok(article.likes_count)
    }

    pub async fn like_status(&self, user_id: i64, article_id: i64) -> Result<bool, DomainError> {
        let key = CacheKey::LikeSet(article_id).to_string();
        match self.fast.set_membership(&key, &user_id.to_string()).await {
            Ok(Some(liked)) => return Ok(liked),
            Ok(None) => {}
            Err(e) => tracing::warn!(key = %key, error = %e, "Like set read failed"),
        }

        let liked = self.likes.exists(user_id, article_id).await?;
        self.repopulate_like_set(article_id).await;
        Ok(liked)
    }

    async fn repopulate_like_set(&self, article_id: i64) {
        let key = CacheKey::LikeSet(article_id).to_string();
        let members: Vec<String> = match self.likes.liked_user_ids(article_id).await {
            Ok(ids) => ids.iter().map(ToString::to_string).collect(),
            Err(e) => {
                tracing::warn!(article_id, error = %e, "Could not load likes for repopulation");
                return;
            }
        };
        if let Err(e) = self
            .fast
            .set_replace(&key, &members, self.policy.likes_ttl)
            .await
        {
            tracing::warn!(key = %key, error = %e, "Like set not repopulated");
        }
    }

    /// Count plus, for a signed-in caller, whether they liked the article.
    pub async fn like_summary(
        &self,
        article_id: i64,
        user_id: Option<i64>,
    ) -> Result<LikeSummary, DomainError> {
        let likes_count = self.like_count(article_id).await?;
        let user_liked = match user_id {
            Some(user_id) => self.like_status(user_id, article_id).await?,
            None => false,
        };
        Ok(LikeSummary {
            article_id,
            likes_count,
            user_liked,
        })
    }

    pub async fn toggle_favorite(
        &self,
        user_id: i64,
        article_id: i64,
    ) -> Result<FavoriteToggle, DomainError> {
        let toggle = self
            .favorites
            .toggle(user_id, article_id)
            .await
            .map_err(or_not_found("article", article_id))?;
        tracing::debug!(user_id, article_id, favorited = toggle.favorited, "Favorite toggled");
        Ok(toggle)
    }

    /// Newest first.
    pub async fn favorites(&self, user_id: i64) -> Result<Vec<FavoriteWithArticle>, DomainError> {
        Ok(self.favorites.list_for_user(user_id).await?)
    }

    /// Removing a favorite that is already gone is not an error.
    pub async fn remove_favorite(&self, user_id: i64, favorite_id: i64) -> Result<(), DomainError> {
        let removed = self.favorites.delete_for_user(user_id, favorite_id).await?;
        tracing::debug!(user_id, favorite_id, removed, "Favorite removed");
        Ok(())
    }
}
