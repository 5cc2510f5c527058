use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Publication state of an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    Draft,
    #[default]
    Published,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::Published => "published",
        }
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArticleStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ArticleStatus::Draft),
            "published" => Ok(ArticleStatus::Published),
            other => Err(DomainError::validation(format!("unknown article status '{other}'"))),
        }
    }
}

/// Article entity - a blog post with its engagement counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub preview: String,
    pub cover: Option<String>,
    pub likes_count: i64,
    pub views_count: i64,
    pub author_id: i64,
    pub category_id: Option<i64>,
    pub status: ArticleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Article {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Author-supplied article fields, used for both create and update.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleDraft {
    pub title: String,
    pub content: String,
    pub preview: String,
    pub cover: Option<String>,
    pub category_id: Option<i64>,
    pub status: ArticleStatus,
}

impl ArticleDraft {
    /// Reject drafts missing any required text field.
    pub fn validate(&self) -> Result<(), DomainError> {
        let required = [
            ("title", &self.title),
            ("content", &self.content),
            ("preview", &self.preview),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(DomainError::validation(format!("{field} is required")));
            }
        }
        if matches!(self.category_id, Some(id) if id <= 0) {
            return Err(DomainError::validation("category id must be positive"));
        }
        Ok(())
    }
}

/// One page of the article list together with the filtered total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticlePage {
    pub data: Vec<Article>,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> ArticleDraft {
        ArticleDraft {
            title: "Rates".into(),
            content: "Body".into(),
            preview: "Short".into(),
            cover: None,
            category_id: Some(3),
            status: ArticleStatus::Published,
        }
    }

    #[test]
    fn blank_title_is_rejected() {
        let mut d = draft();
        d.title = "   ".into();
        assert!(matches!(d.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn status_round_trips_through_str() {
        assert_eq!("draft".parse::<ArticleStatus>().unwrap(), ArticleStatus::Draft);
        assert_eq!(ArticleStatus::Published.to_string(), "published");
        assert!("archived".parse::<ArticleStatus>().is_err());
    }

    #[test]
    fn valid_draft_passes() {
        assert!(draft().validate().is_ok());
    }
}
