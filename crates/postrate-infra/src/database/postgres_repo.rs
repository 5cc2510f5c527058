//! PostgreSQL repository implementations.
//!
//! Multi-step writes run in one transaction; an early return drops the
//! transaction, which rolls it back.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Days, FixedOffset, NaiveTime, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use postrate_core::domain::{
    Article, ArticleDraft, ArticlePage, Category, Comment, ExchangeRate, FavoriteToggle,
    FavoriteWithArticle, LikeToggle, NewComment, NewUser, PageRequest, RateHistoryQuery, User,
};
use postrate_core::error::RepoError;
use postrate_core::ports::{
    ArticleRepository, CategoryRepository, CommentRepository, ExchangeRateRepository,
    FavoriteRepository, LikeRepository, UserRepository,
};

use super::entity::article::{self, Entity as ArticleEntity};
use super::entity::article_like::{self, Entity as LikeEntity};
use super::entity::category::{self, Entity as CategoryEntity};
use super::entity::comment::{self, Entity as CommentEntity};
use super::entity::exchange_rate::{self, Entity as ExchangeRateEntity};
use super::entity::favorite::{self, Entity as FavoriteEntity};
use super::entity::user::{self, Entity as UserEntity};
use super::postgres_base::{PostgresRepository, db_err};

pub type PostgresArticleRepository = PostgresRepository<ArticleEntity>;
pub type PostgresCommentRepository = PostgresRepository<CommentEntity>;
pub type PostgresLikeRepository = PostgresRepository<LikeEntity>;
pub type PostgresFavoriteRepository = PostgresRepository<FavoriteEntity>;
pub type PostgresCategoryRepository = PostgresRepository<CategoryEntity>;
pub type PostgresExchangeRateRepository = PostgresRepository<ExchangeRateEntity>;
pub type PostgresUserRepository = PostgresRepository<UserEntity>;

fn now() -> DateTime<FixedOffset> {
    Utc::now().into()
}

fn live_article() -> Condition {
    Condition::all().add(article::Column::DeletedAt.is_null())
}

#[async_trait]
impl ArticleRepository for PostgresArticleRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Article>, RepoError> {
        let result = ArticleEntity::find_by_id(id)
            .filter(live_article())
            .one(self.db.as_ref())
            .await
            .map_err(db_err)?;

        Ok(result.map(Into::into))
    }

    async fn list(
        &self,
        category_id: Option<i64>,
        page: PageRequest,
    ) -> Result<ArticlePage, RepoError> {
        let mut query = ArticleEntity::find().filter(live_article());
        if let Some(category_id) = category_id {
            query = query.filter(article::Column::CategoryId.eq(category_id));
        }

        let total = query.clone().count(self.db.as_ref()).await.map_err(db_err)?;
        let rows = query
            .order_by_desc(article::Column::CreatedAt)
            .order_by_desc(article::Column::Id)
            .offset(page.offset())
            .limit(page.limit() as u64)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)?;

        Ok(ArticlePage {
            data: rows.into_iter().map(Into::into).collect(),
            total,
        })
    }

    async fn hot(&self, limit: u64) -> Result<Vec<Article>, RepoError> {
        let rows = ArticleEntity::find()
            .filter(live_article())
            .order_by_desc(article::Column::ViewsCount)
            .order_by_desc(article::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create(&self, author_id: i64, draft: ArticleDraft) -> Result<Article, RepoError> {
        let now = now();
        let model = article::ActiveModel {
            id: NotSet,
            title: Set(draft.title),
            content: Set(draft.content),
            preview: Set(draft.preview),
            cover: Set(draft.cover),
            likes_count: Set(0),
            views_count: Set(0),
            author_id: Set(author_id),
            category_id: Set(draft.category_id),
            status: Set(draft.status.as_str().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(db_err)?;

        Ok(model.into())
    }

    async fn update(&self, id: i64, draft: ArticleDraft) -> Result<Article, RepoError> {
        let existing = ArticleEntity::find_by_id(id)
            .filter(live_article())
            .one(self.db.as_ref())
            .await
            .map_err(db_err)?
            .ok_or(RepoError::NotFound)?;

        let mut active = existing.into_active_model();
        active.title = Set(draft.title);
        active.content = Set(draft.content);
        active.preview = Set(draft.preview);
        active.cover = Set(draft.cover);
        active.category_id = Set(draft.category_id);
        active.status = Set(draft.status.as_str().to_string());
        active.updated_at = Set(now());

        let model = active.update(self.db.as_ref()).await.map_err(db_err)?;
        Ok(model.into())
    }

    async fn delete_cascade(&self, id: i64) -> Result<(), RepoError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let result = ArticleEntity::update_many()
            .col_expr(article::Column::DeletedAt, Expr::value(now()))
            .filter(article::Column::Id.eq(id))
            .filter(live_article())
            .exec(&txn)
            .await
            .map_err(db_err)?;
        if result.rows_affected == 0 {
            return Err(RepoError::NotFound);
        }

        let comments = CommentEntity::delete_many()
            .filter(comment::Column::ArticleId.eq(id))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        let likes = LikeEntity::delete_many()
            .filter(article_like::Column::ArticleId.eq(id))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        let favorites = FavoriteEntity::delete_many()
            .filter(favorite::Column::ArticleId.eq(id))
            .exec(&txn)
            .await
            .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;
        tracing::debug!(
            article_id = id,
            comments = comments.rows_affected,
            likes = likes.rows_affected,
            favorites = favorites.rows_affected,
            "Article soft-deleted with dependents"
        );
        Ok(())
    }

    async fn increment_views(&self, id: i64) -> Result<(), RepoError> {
        let result = ArticleEntity::update_many()
            .col_expr(
                article::Column::ViewsCount,
                Expr::col(article::Column::ViewsCount).add(1),
            )
            .filter(article::Column::Id.eq(id))
            .filter(live_article())
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;

        if result.rows_affected == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl CommentRepository for PostgresCommentRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Comment>, RepoError> {
        let result = CommentEntity::find_by_id(id)
            .filter(comment::Column::DeletedAt.is_null())
            .one(self.db.as_ref())
            .await
            .map_err(db_err)?;

        Ok(result.map(Into::into))
    }

    async fn page(&self, article_id: i64, page: PageRequest) -> Result<Vec<Comment>, RepoError> {
        let rows = CommentEntity::find()
            .filter(comment::Column::ArticleId.eq(article_id))
            .filter(comment::Column::DeletedAt.is_null())
            .order_by_asc(comment::Column::CreatedAt)
            .order_by_asc(comment::Column::Id)
            .offset(page.offset())
            .limit(page.limit() as u64)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create(&self, new: NewComment) -> Result<Comment, RepoError> {
        let model = comment::ActiveModel {
            id: NotSet,
            article_id: Set(new.article_id),
            user_id: Set(new.user_id),
            user_name: Set(new.user_name),
            content: Set(new.content),
            parent_id: Set(new.parent_id),
            created_at: Set(now()),
            deleted_at: Set(None),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(db_err)?;

        Ok(model.into())
    }

    async fn delete_cascade(&self, id: i64) -> Result<u64, RepoError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let target = CommentEntity::find_by_id(id)
            .filter(comment::Column::DeletedAt.is_null())
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or(RepoError::NotFound)?;

        let mut scope = Condition::any().add(comment::Column::Id.eq(id));
        if target.parent_id.is_none() {
            scope = scope.add(comment::Column::ParentId.eq(id));
        }

        let result = CommentEntity::delete_many()
            .filter(scope)
            .exec(&txn)
            .await
            .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;
        Ok(result.rows_affected)
    }
}

#[async_trait]
impl LikeRepository for PostgresLikeRepository {
    async fn toggle(&self, user_id: i64, article_id: i64) -> Result<LikeToggle, RepoError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        // Row lock serialises concurrent toggles on the same article.
        ArticleEntity::find_by_id(article_id)
            .filter(live_article())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or(RepoError::NotFound)?;

        let existing = LikeEntity::find_by_id((user_id, article_id))
            .one(&txn)
            .await
            .map_err(db_err)?;

        let liked = match existing {
            Some(_) => {
                LikeEntity::delete_by_id((user_id, article_id))
                    .exec(&txn)
                    .await
                    .map_err(db_err)?;
                ArticleEntity::update_many()
                    .col_expr(
                        article::Column::LikesCount,
                        Expr::col(article::Column::LikesCount).sub(1),
                    )
                    .filter(article::Column::Id.eq(article_id))
                    .filter(article::Column::LikesCount.gt(0))
                    .exec(&txn)
                    .await
                    .map_err(db_err)?;
                false
            }
            None => {
                article_like::ActiveModel {
                    user_id: Set(user_id),
                    article_id: Set(article_id),
                    created_at: Set(now()),
                }
                .insert(&txn)
                .await
                .map_err(db_err)?;
                ArticleEntity::update_many()
                    .col_expr(
                        article::Column::LikesCount,
                        Expr::col(article::Column::LikesCount).add(1),
                    )
                    .filter(article::Column::Id.eq(article_id))
                    .exec(&txn)
                    .await
                    .map_err(db_err)?;
                true
            }
        };

        let likes_count = ArticleEntity::find_by_id(article_id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .map(|a| a.likes_count)
            .ok_or(RepoError::NotFound)?;

        txn.commit().await.map_err(db_err)?;
        Ok(LikeToggle { liked, likes_count })
    }

    async fn exists(&self, user_id: i64, article_id: i64) -> Result<bool, RepoError> {
        let found = LikeEntity::find_by_id((user_id, article_id))
            .one(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(found.is_some())
    }

    async fn liked_user_ids(&self, article_id: i64) -> Result<Vec<i64>, RepoError> {
        LikeEntity::find()
            .select_only()
            .column(article_like::Column::UserId)
            .filter(article_like::Column::ArticleId.eq(article_id))
            .into_tuple::<i64>()
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }
}

#[async_trait]
impl FavoriteRepository for PostgresFavoriteRepository {
    async fn toggle(&self, user_id: i64, article_id: i64) -> Result<FavoriteToggle, RepoError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        ArticleEntity::find_by_id(article_id)
            .filter(live_article())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or(RepoError::NotFound)?;

        let existing = FavoriteEntity::find()
            .filter(favorite::Column::UserId.eq(user_id))
            .filter(favorite::Column::ArticleId.eq(article_id))
            .one(&txn)
            .await
            .map_err(db_err)?;

        let favorited = match existing {
            Some(row) => {
                FavoriteEntity::delete_by_id(row.id)
                    .exec(&txn)
                    .await
                    .map_err(db_err)?;
                false
            }
            None => {
                favorite::ActiveModel {
                    id: NotSet,
                    user_id: Set(user_id),
                    article_id: Set(article_id),
                    created_at: Set(now()),
                }
                .insert(&txn)
                .await
                .map_err(db_err)?;
                true
            }
        };

        txn.commit().await.map_err(db_err)?;
        Ok(FavoriteToggle { favorited })
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<FavoriteWithArticle>, RepoError> {
        let rows = FavoriteEntity::find()
            .filter(favorite::Column::UserId.eq(user_id))
            .order_by_desc(favorite::Column::CreatedAt)
            .order_by_desc(favorite::Column::Id)
            .find_also_related(ArticleEntity)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|(fav, article)| FavoriteWithArticle {
                favorite: fav.into(),
                article: article
                    .filter(|a| a.deleted_at.is_none())
                    .map(Into::into),
            })
            .collect())
    }

    async fn delete_for_user(&self, user_id: i64, favorite_id: i64) -> Result<u64, RepoError> {
        let result = FavoriteEntity::delete_many()
            .filter(favorite::Column::Id.eq(favorite_id))
            .filter(favorite::Column::UserId.eq(user_id))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected)
    }
}

#[async_trait]
impl CategoryRepository for PostgresCategoryRepository {
    async fn list(&self) -> Result<Vec<Category>, RepoError> {
        let rows = CategoryEntity::find()
            .order_by_asc(category::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create(&self, name: &str) -> Result<Category, RepoError> {
        let model = category::ActiveModel {
            id: NotSet,
            name: Set(name.to_string()),
            created_at: Set(now()),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(db_err)?;
        Ok(model.into())
    }

    async fn delete(&self, id: i64) -> Result<(), RepoError> {
        let result = CategoryEntity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;

        if result.rows_affected == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl ExchangeRateRepository for PostgresExchangeRateRepository {
    async fn replace_base_rates(
        &self,
        base: &str,
        rates: &BTreeMap<String, f64>,
        date: DateTime<Utc>,
    ) -> Result<usize, RepoError> {
        if rates.is_empty() {
            return Err(RepoError::Query("refusing to store an empty rate table".into()));
        }

        let date: DateTime<FixedOffset> = date.into();
        let rows: Vec<exchange_rate::ActiveModel> = rates
            .iter()
            .map(|(code, rate)| exchange_rate::ActiveModel {
                id: NotSet,
                from_currency: Set(base.to_string()),
                to_currency: Set(code.clone()),
                rate: Set(*rate),
                date: Set(date),
            })
            .collect();

        let txn = self.db.begin().await.map_err(db_err)?;
        ExchangeRateEntity::delete_many()
            .exec(&txn)
            .await
            .map_err(db_err)?;
        ExchangeRateEntity::insert_many(rows)
            .exec(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;

        Ok(rates.len())
    }

    async fn base_rates(&self, base: &str) -> Result<Vec<ExchangeRate>, RepoError> {
        let rows = ExchangeRateEntity::find()
            .filter(exchange_rate::Column::FromCurrency.eq(base))
            .order_by_asc(exchange_rate::Column::ToCurrency)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn history(&self, query: &RateHistoryQuery) -> Result<Vec<ExchangeRate>, RepoError> {
        let mut select = ExchangeRateEntity::find();
        if let Some((from, to)) = &query.pair {
            select = select
                .filter(exchange_rate::Column::FromCurrency.eq(from.as_str()))
                .filter(exchange_rate::Column::ToCurrency.eq(to.as_str()));
        }
        if let Some(start) = query.start {
            let start: DateTime<FixedOffset> = start.and_time(NaiveTime::MIN).and_utc().into();
            select = select.filter(exchange_rate::Column::Date.gte(start));
        }
        if let Some(end) = query.end {
            if let Some(next_day) = end.checked_add_days(Days::new(1)) {
                let end: DateTime<FixedOffset> = next_day.and_time(NaiveTime::MIN).and_utc().into();
                select = select.filter(exchange_rate::Column::Date.lt(end));
            }
        }

        let rows = select
            .order_by_desc(exchange_rate::Column::Date)
            .order_by_asc(exchange_rate::Column::ToCurrency)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepoError> {
        let result = UserEntity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(result.map(Into::into))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        tracing::debug!(username = %username, "Finding user by username");

        let result = UserEntity::find()
            .filter(user::Column::Username.eq(username))
            .one(self.db.as_ref())
            .await
            .map_err(db_err)?;

        Ok(result.map(Into::into))
    }

    async fn create(&self, new: NewUser) -> Result<User, RepoError> {
        let model = user::ActiveModel {
            id: NotSet,
            username: Set(new.username),
            password_hash: Set(new.password_hash),
            role: Set(new.role.as_str().to_string()),
            nickname: Set(new.nickname),
            created_at: Set(now()),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(db_err)?;
        Ok(model.into())
    }
}
