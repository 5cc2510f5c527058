//! Write-invalidate: after a durable commit, delete the exact keys and every
//! key under the affected prefixes.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ports::{CacheError, FastStore, Job, JobPayload, JobQueue};

use super::{CacheKey, KeyPattern};

/// Cache entries made stale by one write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invalidation {
    pub keys: Vec<String>,
    pub patterns: Vec<String>,
}

impl Invalidation {
    /// Any article was added: every list page and the hot list.
    pub fn articles_changed() -> Self {
        Self {
            keys: vec![CacheKey::HotArticles.to_string()],
            patterns: vec![KeyPattern::ArticleLists.to_string()],
        }
    }

    /// One article was edited, or its counters moved.
    pub fn article_changed(id: i64) -> Self {
        let mut inv = Self::articles_changed();
        inv.keys.push(CacheKey::ArticleDetail(id).to_string());
        inv
    }

    /// One article is gone, together with its likes and comments.
    pub fn article_removed(id: i64) -> Self {
        let mut inv = Self::article_changed(id);
        inv.keys.push(CacheKey::LikeCount(id).to_string());
        inv.keys.push(CacheKey::LikeSet(id).to_string());
        inv.patterns.push(KeyPattern::CommentPages(id).to_string());
        inv
    }

    pub fn comments_changed(article_id: i64) -> Self {
        Self {
            keys: Vec::new(),
            patterns: vec![KeyPattern::CommentPages(article_id).to_string()],
        }
    }

    pub fn categories_changed() -> Self {
        Self {
            keys: vec![CacheKey::Categories.to_string()],
            patterns: Vec::new(),
        }
    }

    pub fn merge(mut self, other: Invalidation) -> Self {
        for key in other.keys {
            if !self.keys.contains(&key) {
                self.keys.push(key);
            }
        }
        for pattern in other.patterns {
            if !self.patterns.contains(&pattern) {
                self.patterns.push(pattern);
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.patterns.is_empty()
    }
}

/// Whether invalidation runs inside the request or on the job queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidationMode {
    /// Delete before the response is sent.
    Sync,
    /// Queue a job; a rejected job falls back to `Sync`.
    #[default]
    Background,
}

impl fmt::Display for InvalidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidationMode::Sync => f.write_str("sync"),
            InvalidationMode::Background => f.write_str("background"),
        }
    }
}

impl FromStr for InvalidationMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sync" => Ok(InvalidationMode::Sync),
            "background" | "async" => Ok(InvalidationMode::Background),
            other => Err(DomainError::validation(format!(
                "unknown invalidation mode '{other}'"
            ))),
        }
    }
}

/// Applies invalidations against the fast store.
#[derive(Clone)]
pub struct Invalidator {
    store: Arc<dyn FastStore>,
    queue: Arc<dyn JobQueue>,
    mode: InvalidationMode,
    scan_batch: usize,
}

impl Invalidator {
    pub fn new(
        store: Arc<dyn FastStore>,
        queue: Arc<dyn JobQueue>,
        mode: InvalidationMode,
        scan_batch: usize,
    ) -> Self {
        Self {
            store,
            queue,
            mode,
            scan_batch: scan_batch.max(1),
        }
    }

    pub fn mode(&self) -> InvalidationMode {
        self.mode
    }

    /// Delete every entry covered by `inv`. Patterns are walked with an
    /// incremental cursor scan, deleting each batch as it arrives.
    pub async fn apply(&self, inv: &Invalidation) -> Result<u64, CacheError> {
        let mut removed = 0;

        if !inv.keys.is_empty() {
            removed += self.store.delete(&inv.keys).await?;
        }

        for pattern in &inv.patterns {
            let mut cursor = 0;
            loop {
                let (next, batch) = self.store.scan(cursor, pattern, self.scan_batch).await?;
                if !batch.is_empty() {
                    removed += self.store.delete(&batch).await?;
                }
                if next == 0 {
                    break;
                }
                cursor = next;
            }
        }

        tracing::debug!(
            keys = inv.keys.len(),
            patterns = inv.patterns.len(),
            removed,
            "Cache invalidated"
        );
        Ok(removed)
    }

    /// Invalidate according to the configured mode. Never fails the caller:
    /// fast-store errors are logged and left to TTL expiry.
    pub async fn dispatch(&self, inv: Invalidation) {
        if inv.is_empty() {
            return;
        }

        if self.mode == InvalidationMode::Background {
            match self.queue.enqueue(Job::new(JobPayload::Invalidate(inv.clone()))) {
                Ok(()) => return,
                Err(e) => {
                    tracing::warn!(error = %e, "Invalidation job rejected, applying inline");
                }
            }
        }

        if let Err(e) = self.apply(&inv).await {
            tracing::warn!(error = %e, "Cache invalidation failed, entries expire by TTL");
        }
    }
}
