use std::sync::Arc;

use crate::cache::{CacheKey, CachePolicy, Invalidation, Invalidator, ReadThrough};
use crate::domain::{Actor, Comment, CommentDraft, NewComment, PageRequest};
use crate::error::DomainError;
use crate::ports::{ArticleRepository, CommentRepository, UserRepository};

use super::or_not_found;

#[derive(Clone)]
pub struct CommentService {
    comments: Arc<dyn CommentRepository>,
    articles: Arc<dyn ArticleRepository>,
    users: Arc<dyn UserRepository>,
    cache: ReadThrough,
    invalidator: Invalidator,
    policy: CachePolicy,
}

impl CommentService {
    pub fn new(
        comments: Arc<dyn CommentRepository>,
        articles: Arc<dyn ArticleRepository>,
        users: Arc<dyn UserRepository>,
        cache: ReadThrough,
        invalidator: Invalidator,
        policy: CachePolicy,
    ) -> Self {
        Self {
            comments,
            articles,
            users,
            cache,
            invalidator,
            policy,
        }
    }

    /// One page of an article's comments, oldest first. NotFound for a
    /// missing or deleted article; such pages are never cached.
    pub async fn page(
        &self,
        article_id: i64,
        page: PageRequest,
    ) -> Result<Vec<Comment>, DomainError> {
        let key = CacheKey::CommentPage { article_id, page };
        self.cache
            .get_or_load(&key, self.policy.content_ttl, move || async move {
                if self.articles.find_by_id(article_id).await?.is_none() {
                    return Err(DomainError::not_found("article", article_id));
                }
                self.comments
                    .page(article_id, page)
                    .await
                    .map_err(DomainError::from)
            })
            .await
    }

    /// Post a comment, or a reply to a top-level comment of the same article.
    pub async fn create(
        &self,
        actor: &Actor,
        article_id: i64,
        draft: CommentDraft,
    ) -> Result<Comment, DomainError> {
        let content = draft.content.trim();
        if content.is_empty() {
            return Err(DomainError::validation("content is required"));
        }

        if self.articles.find_by_id(article_id).await?.is_none() {
            return Err(DomainError::not_found("article", article_id));
        }

        if let Some(parent_id) = draft.parent_id {
            let parent = self
                .comments
                .find_by_id(parent_id)
                .await?
                .ok_or_else(|| DomainError::validation("parent comment does not exist"))?;
            if parent.article_id != article_id {
                return Err(DomainError::validation(
                    "parent comment belongs to another article",
                ));
            }
            if !parent.is_top_level() {
                return Err(DomainError::validation("replies cannot be nested"));
            }
        }

        let user = self
            .users
            .find_by_id(actor.user_id)
            .await?
            .ok_or(DomainError::Unauthorized)?;

        let comment = self
            .comments
            .create(NewComment {
                article_id,
                user_id: user.id,
                user_name: user.display_name().to_string(),
                content: content.to_string(),
                parent_id: draft.parent_id,
            })
            .await?;
        tracing::debug!(comment_id = comment.id, article_id, "Comment created");

        self.invalidator
            .dispatch(Invalidation::comments_changed(article_id))
            .await;
        Ok(comment)
    }

    /// Delete a comment (and its replies, if top-level). Only the author or an
    /// admin may do so. Returns the number of comments removed.
    pub async fn delete(&self, actor: &Actor, comment_id: i64) -> Result<u64, DomainError> {
        let comment = self
            .comments
            .find_by_id(comment_id)
            .await?
            .ok_or_else(|| DomainError::not_found("comment", comment_id))?;

        if comment.user_id != actor.user_id && !actor.is_admin() {
            return Err(DomainError::Forbidden(
                "only the author or an admin may delete this comment".to_string(),
            ));
        }

        let removed = self
            .comments
            .delete_cascade(comment_id)
            .await
            .map_err(or_not_found("comment", comment_id))?;
        tracing::debug!(comment_id, removed, "Comment deleted");

        self.invalidator
            .dispatch(Invalidation::comments_changed(comment.article_id))
            .await;
        Ok(removed)
    }
}
