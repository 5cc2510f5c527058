//! Likes and favorites.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Article;

/// A live like; at most one per (user, article).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleLike {
    pub user_id: i64,
    pub article_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a committed like toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeToggle {
    pub liked: bool,
    pub likes_count: i64,
}

/// Like count for an article plus the caller's own status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeSummary {
    pub article_id: i64,
    pub likes_count: i64,
    pub user_liked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: i64,
    pub user_id: i64,
    pub article_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteToggle {
    pub favorited: bool,
}

/// A favorite with its article; `article` is `None` once the article is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteWithArticle {
    #[serde(flatten)]
    pub favorite: Favorite,
    pub article: Option<Article>,
}
