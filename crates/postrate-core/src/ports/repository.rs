use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Article, ArticleDraft, ArticlePage, Category, Comment, ExchangeRate, FavoriteToggle,
    FavoriteWithArticle, LikeToggle, NewComment, NewUser, PageRequest, RateHistoryQuery, User,
};
use crate::error::RepoError;

/// Article repository. Reads never return soft-deleted rows.
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Article>, RepoError>;

    /// Newest first, optionally filtered by category.
    async fn list(
        &self,
        category_id: Option<i64>,
        page: PageRequest,
    ) -> Result<ArticlePage, RepoError>;

    /// Most viewed first.
    async fn hot(&self, limit: u64) -> Result<Vec<Article>, RepoError>;

    async fn create(&self, author_id: i64, draft: ArticleDraft) -> Result<Article, RepoError>;

    /// `RepoError::NotFound` when the article is absent.
    async fn update(&self, id: i64, draft: ArticleDraft) -> Result<Article, RepoError>;

    /// Soft-delete the article and remove its comments, likes and favorites in
    /// one transaction.
    async fn delete_cascade(&self, id: i64) -> Result<(), RepoError>;

    /// `views_count = views_count + 1`.
    async fn increment_views(&self, id: i64) -> Result<(), RepoError>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Comment>, RepoError>;

    /// Oldest first.
    async fn page(&self, article_id: i64, page: PageRequest) -> Result<Vec<Comment>, RepoError>;

    async fn create(&self, comment: NewComment) -> Result<Comment, RepoError>;

    /// Delete the comment and, for a top-level comment, every reply to it, in
    /// one transaction. Returns the number of rows removed.
    async fn delete_cascade(&self, id: i64) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait LikeRepository: Send + Sync {
    /// Flip the like for (user, article) inside one transaction, adjusting
    /// `likes_count` relatively. `RepoError::NotFound` when the article is absent.
    async fn toggle(&self, user_id: i64, article_id: i64) -> Result<LikeToggle, RepoError>;

    async fn exists(&self, user_id: i64, article_id: i64) -> Result<bool, RepoError>;

    async fn liked_user_ids(&self, article_id: i64) -> Result<Vec<i64>, RepoError>;
}

#[async_trait]
pub trait FavoriteRepository: Send + Sync {
    /// Flip the favorite for (user, article) inside one transaction.
    async fn toggle(&self, user_id: i64, article_id: i64) -> Result<FavoriteToggle, RepoError>;

    /// Newest first.
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<FavoriteWithArticle>, RepoError>;

    /// Hard delete scoped to the owner. Returns rows removed.
    async fn delete_for_user(&self, user_id: i64, favorite_id: i64) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Category>, RepoError>;

    /// `RepoError::Constraint` when the name is taken.
    async fn create(&self, name: &str) -> Result<Category, RepoError>;

    async fn delete(&self, id: i64) -> Result<(), RepoError>;
}

#[async_trait]
pub trait ExchangeRateRepository: Send + Sync {
    /// Delete every stored row and insert one `base -> code` row per entry,
    /// in one transaction. Returns rows inserted.
    async fn replace_base_rates(
        &self,
        base: &str,
        rates: &BTreeMap<String, f64>,
        date: DateTime<Utc>,
    ) -> Result<usize, RepoError>;

    async fn base_rates(&self, base: &str) -> Result<Vec<ExchangeRate>, RepoError>;

    /// Newest first.
    async fn history(&self, query: &RateHistoryQuery) -> Result<Vec<ExchangeRate>, RepoError>;
}

/// User repository with domain-specific methods.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepoError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError>;

    /// `RepoError::Constraint` when the username is taken.
    async fn create(&self, user: NewUser) -> Result<User, RepoError>;
}
