//! Cache key definitions.
//!
//! Every cacheable result is addressed by a resource prefix plus each
//! parameter that changes the result, so distinct queries never collide.

use std::fmt;

use crate::domain::PageRequest;

/// A single fast-store entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// `articles:list:<category|all>:page_<n>:limit_<n>`
    ArticleList {
        category_id: Option<i64>,
        page: PageRequest,
    },
    /// `articles:single:<id>`
    ArticleDetail(i64),
    /// `articles:hot`
    HotArticles,
    /// `categories:list`
    Categories,
    /// `comments:article:<id>:page_<n>:limit_<n>`
    CommentPage { article_id: i64, page: PageRequest },
    /// `article:likes:count:<id>`
    LikeCount(i64),
    /// `article:likes:<id>`
    LikeSet(i64),
    /// `rates:usd_base`
    RateSnapshot,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::ArticleList { category_id, page } => {
                f.write_str("articles:list:")?;
                match category_id {
                    Some(id) => write!(f, "{id}")?,
                    None => f.write_str("all")?,
                }
                write!(f, ":page_{}:limit_{}", page.page(), page.limit())
            }
            CacheKey::ArticleDetail(id) => write!(f, "articles:single:{id}"),
            CacheKey::HotArticles => f.write_str("articles:hot"),
            CacheKey::Categories => f.write_str("categories:list"),
            CacheKey::CommentPage { article_id, page } => write!(
                f,
                "comments:article:{article_id}:page_{}:limit_{}",
                page.page(),
                page.limit()
            ),
            CacheKey::LikeCount(id) => write!(f, "article:likes:count:{id}"),
            CacheKey::LikeSet(id) => write!(f, "article:likes:{id}"),
            CacheKey::RateSnapshot => f.write_str("rates:usd_base"),
        }
    }
}

/// A glob over a family of keys, used only for invalidation scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPattern {
    /// Every article list page under every category filter.
    ArticleLists,
    /// Every comment page of one article.
    CommentPages(i64),
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPattern::ArticleLists => f.write_str("articles:list:*"),
            // The trailing colon keeps article 1 from matching article 10.
            KeyPattern::CommentPages(id) => write!(f, "comments:article:{id}:*"),
        }
    }
}
