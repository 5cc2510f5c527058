//! In-memory durable store.
//!
//! Every repository port over one set of tables behind an async RwLock. Each
//! operation holds the write lock for its whole duration, which gives the
//! multi-step operations the same all-or-nothing behaviour as a transaction.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveTime, Utc};
use tokio::sync::RwLock;

use postrate_core::domain::{
    Article, ArticleDraft, ArticleLike, ArticlePage, Category, Comment, ExchangeRate, Favorite,
    FavoriteToggle, FavoriteWithArticle, LikeToggle, NewComment, NewUser, PageRequest,
    RateHistoryQuery, User,
};
use postrate_core::error::RepoError;
use postrate_core::ports::{
    ArticleRepository, CategoryRepository, CommentRepository, ExchangeRateRepository,
    FavoriteRepository, LikeRepository, UserRepository,
};

#[derive(Default)]
struct Sequences {
    articles: i64,
    comments: i64,
    favorites: i64,
    categories: i64,
    rates: i64,
    users: i64,
}

fn next(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

#[derive(Default)]
struct Tables {
    articles: BTreeMap<i64, Article>,
    comments: BTreeMap<i64, Comment>,
    /// Keyed by (article_id, user_id).
    likes: BTreeMap<(i64, i64), ArticleLike>,
    favorites: BTreeMap<i64, Favorite>,
    categories: BTreeMap<i64, Category>,
    rates: Vec<ExchangeRate>,
    users: BTreeMap<i64, User>,
    seq: Sequences,
}

impl Tables {
    fn live_article(&self, id: i64) -> Option<&Article> {
        self.articles.get(&id).filter(|a| !a.is_deleted())
    }

    fn live_article_mut(&mut self, id: i64) -> Option<&mut Article> {
        self.articles.get_mut(&id).filter(|a| !a.is_deleted())
    }
}

fn page_of<T: Clone>(rows: Vec<&T>, page: PageRequest) -> Vec<T> {
    rows.into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .cloned()
        .collect()
}

/// In-memory implementation of every durable repository.
#[derive(Default)]
pub struct InMemoryDatabase {
    tables: RwLock<Tables>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArticleRepository for InMemoryDatabase {
    async fn find_by_id(&self, id: i64) -> Result<Option<Article>, RepoError> {
        Ok(self.tables.read().await.live_article(id).cloned())
    }

    async fn list(
        &self,
        category_id: Option<i64>,
        page: PageRequest,
    ) -> Result<ArticlePage, RepoError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&Article> = tables
            .articles
            .values()
            .filter(|a| !a.is_deleted())
            .filter(|a| category_id.is_none() || a.category_id == category_id)
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = rows.len() as u64;
        Ok(ArticlePage {
            data: page_of(rows, page),
            total,
        })
    }

    async fn hot(&self, limit: u64) -> Result<Vec<Article>, RepoError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&Article> = tables.articles.values().filter(|a| !a.is_deleted()).collect();
        rows.sort_by(|a, b| b.views_count.cmp(&a.views_count).then(b.id.cmp(&a.id)));
        Ok(rows.into_iter().take(limit as usize).cloned().collect())
    }

    async fn create(&self, author_id: i64, draft: ArticleDraft) -> Result<Article, RepoError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let article = Article {
            id: next(&mut tables.seq.articles),
            title: draft.title,
            content: draft.content,
            preview: draft.preview,
            cover: draft.cover,
            likes_count: 0,
            views_count: 0,
            author_id,
            category_id: draft.category_id,
            status: draft.status,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        tables.articles.insert(article.id, article.clone());
        Ok(article)
    }

    async fn update(&self, id: i64, draft: ArticleDraft) -> Result<Article, RepoError> {
        let mut tables = self.tables.write().await;
        let article = tables.live_article_mut(id).ok_or(RepoError::NotFound)?;
        article.title = draft.title;
        article.content = draft.content;
        article.preview = draft.preview;
        article.cover = draft.cover;
        article.category_id = draft.category_id;
        article.status = draft.status;
        article.updated_at = Utc::now();
        Ok(article.clone())
    }

    async fn delete_cascade(&self, id: i64) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        let article = tables.live_article_mut(id).ok_or(RepoError::NotFound)?;
        article.deleted_at = Some(Utc::now());

        tables.comments.retain(|_, c| c.article_id != id);
        tables.likes.retain(|(article_id, _), _| *article_id != id);
        tables.favorites.retain(|_, f| f.article_id != id);
        Ok(())
    }

    async fn increment_views(&self, id: i64) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        let article = tables.live_article_mut(id).ok_or(RepoError::NotFound)?;
        article.views_count += 1;
        Ok(())
    }
}

#[async_trait]
impl CommentRepository for InMemoryDatabase {
    async fn find_by_id(&self, id: i64) -> Result<Option<Comment>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .comments
            .get(&id)
            .filter(|c| c.deleted_at.is_none())
            .cloned())
    }

    async fn page(&self, article_id: i64, page: PageRequest) -> Result<Vec<Comment>, RepoError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&Comment> = tables
            .comments
            .values()
            .filter(|c| c.article_id == article_id && c.deleted_at.is_none())
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(page_of(rows, page))
    }

    async fn create(&self, new: NewComment) -> Result<Comment, RepoError> {
        let mut tables = self.tables.write().await;
        let comment = Comment {
            id: next(&mut tables.seq.comments),
            article_id: new.article_id,
            user_id: new.user_id,
            user_name: new.user_name,
            content: new.content,
            parent_id: new.parent_id,
            created_at: Utc::now(),
            deleted_at: None,
        };
        tables.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn delete_cascade(&self, id: i64) -> Result<u64, RepoError> {
        let mut tables = self.tables.write().await;
        let target = tables
            .comments
            .get(&id)
            .filter(|c| c.deleted_at.is_none())
            .ok_or(RepoError::NotFound)?;
        let top_level = target.is_top_level();

        let before = tables.comments.len();
        tables
            .comments
            .retain(|cid, c| *cid != id && !(top_level && c.parent_id == Some(id)));
        Ok((before - tables.comments.len()) as u64)
    }
}

#[async_trait]
impl LikeRepository for InMemoryDatabase {
    async fn toggle(&self, user_id: i64, article_id: i64) -> Result<LikeToggle, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.live_article(article_id).is_none() {
            return Err(RepoError::NotFound);
        }

        let key = (article_id, user_id);
        let liked = if tables.likes.remove(&key).is_some() {
            false
        } else {
            tables.likes.insert(
                key,
                ArticleLike {
                    user_id,
                    article_id,
                    created_at: Utc::now(),
                },
            );
            true
        };

        let article = tables
            .live_article_mut(article_id)
            .ok_or(RepoError::NotFound)?;
        article.likes_count = if liked {
            article.likes_count + 1
        } else {
            (article.likes_count - 1).max(0)
        };

        Ok(LikeToggle {
            liked,
            likes_count: article.likes_count,
        })
    }

    async fn exists(&self, user_id: i64, article_id: i64) -> Result<bool, RepoError> {
        Ok(self
            .tables
            .read()
            .await
            .likes
            .contains_key(&(article_id, user_id)))
    }

    async fn liked_user_ids(&self, article_id: i64) -> Result<Vec<i64>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .likes
            .range((article_id, i64::MIN)..=(article_id, i64::MAX))
            .map(|((_, user_id), _)| *user_id)
            .collect())
    }
}

#[async_trait]
impl FavoriteRepository for InMemoryDatabase {
    async fn toggle(&self, user_id: i64, article_id: i64) -> Result<FavoriteToggle, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.live_article(article_id).is_none() {
            return Err(RepoError::NotFound);
        }

        let existing = tables
            .favorites
            .values()
            .find(|f| f.user_id == user_id && f.article_id == article_id)
            .map(|f| f.id);

        let favorited = match existing {
            Some(id) => {
                tables.favorites.remove(&id);
                false
            }
            None => {
                let id = next(&mut tables.seq.favorites);
                tables.favorites.insert(
                    id,
                    Favorite {
                        id,
                        user_id,
                        article_id,
                        created_at: Utc::now(),
                    },
                );
                true
            }
        };
        Ok(FavoriteToggle { favorited })
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<FavoriteWithArticle>, RepoError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&Favorite> = tables
            .favorites
            .values()
            .filter(|f| f.user_id == user_id)
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(rows
            .into_iter()
            .map(|f| FavoriteWithArticle {
                favorite: *f,
                article: tables.live_article(f.article_id).cloned(),
            })
            .collect())
    }

    async fn delete_for_user(&self, user_id: i64, favorite_id: i64) -> Result<u64, RepoError> {
        let mut tables = self.tables.write().await;
        let owned = tables
            .favorites
            .get(&favorite_id)
            .is_some_and(|f| f.user_id == user_id);
        if owned {
            tables.favorites.remove(&favorite_id);
            Ok(1)
        } else {
            Ok(0)
        }
    }
}

#[async_trait]
impl CategoryRepository for InMemoryDatabase {
    async fn list(&self) -> Result<Vec<Category>, RepoError> {
        Ok(self.tables.read().await.categories.values().cloned().collect())
    }

    async fn create(&self, name: &str) -> Result<Category, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.categories.values().any(|c| c.name == name) {
            return Err(RepoError::Constraint(format!("category name '{name}' is taken")));
        }
        let category = Category {
            id: next(&mut tables.seq.categories),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        tables.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn delete(&self, id: i64) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        tables
            .categories
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl ExchangeRateRepository for InMemoryDatabase {
    async fn replace_base_rates(
        &self,
        base: &str,
        rates: &BTreeMap<String, f64>,
        date: DateTime<Utc>,
    ) -> Result<usize, RepoError> {
        if rates.is_empty() {
            return Err(RepoError::Query("refusing to store an empty rate table".into()));
        }

        let mut tables = self.tables.write().await;
        let mut rows = Vec::with_capacity(rates.len());
        for (code, rate) in rates {
            rows.push(ExchangeRate {
                id: next(&mut tables.seq.rates),
                from_currency: base.to_string(),
                to_currency: code.clone(),
                rate: *rate,
                date,
            });
        }
        tables.rates = rows;
        Ok(rates.len())
    }

    async fn base_rates(&self, base: &str) -> Result<Vec<ExchangeRate>, RepoError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<ExchangeRate> = tables
            .rates
            .iter()
            .filter(|r| r.from_currency == base)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.to_currency.cmp(&b.to_currency));
        Ok(rows)
    }

    async fn history(&self, query: &RateHistoryQuery) -> Result<Vec<ExchangeRate>, RepoError> {
        let start = query.start.map(|d| d.and_time(NaiveTime::MIN).and_utc());
        let end = query
            .end
            .and_then(|d| d.checked_add_days(Days::new(1)))
            .map(|d| d.and_time(NaiveTime::MIN).and_utc());

        let tables = self.tables.read().await;
        let mut rows: Vec<ExchangeRate> = tables
            .rates
            .iter()
            .filter(|r| match &query.pair {
                Some((from, to)) => r.from_currency == from.as_str() && r.to_currency == to.as_str(),
                None => true,
            })
            .filter(|r| start.is_none_or(|s| r.date >= s))
            .filter(|r| end.is_none_or(|e| r.date < e))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(a.to_currency.cmp(&b.to_currency)));
        Ok(rows)
    }
}

#[async_trait]
impl UserRepository for InMemoryDatabase {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepoError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create(&self, new: NewUser) -> Result<User, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.username == new.username) {
            return Err(RepoError::Constraint(format!(
                "username '{}' is taken",
                new.username
            )));
        }
        let user = User {
            id: next(&mut tables.seq.users),
            username: new.username,
            password_hash: new.password_hash,
            role: new.role,
            nickname: new.nickname,
            created_at: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }
}
