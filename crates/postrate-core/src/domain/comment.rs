use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Comment entity. `parent_id` is `None` for top-level comments; replies are
/// exactly one level deep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub article_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub content: String,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Comment {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Comment body as submitted by a user.
#[derive(Debug, Clone)]
pub struct CommentDraft {
    pub content: String,
    pub parent_id: Option<i64>,
}

/// Fully resolved comment ready for insertion.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub article_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub content: String,
    pub parent_id: Option<i64>,
}
