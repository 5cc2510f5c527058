use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult, Value};

use postrate_core::domain::PageRequest;
use postrate_core::error::RepoError;
use postrate_core::ports::{ArticleRepository, CommentRepository, LikeRepository};

use crate::database::entity::{article, article_like, comment};
use crate::database::postgres_base::db_err;
use crate::database::postgres_repo::{
    PostgresArticleRepository, PostgresCommentRepository, PostgresLikeRepository,
};

fn article_model(id: i64, likes_count: i64) -> article::Model {
    let now = Utc::now();
    article::Model {
        id,
        title: "Rates explained".to_owned(),
        content: "Body".to_owned(),
        preview: "Preview".to_owned(),
        cover: None,
        likes_count,
        views_count: 12,
        author_id: 1,
        category_id: Some(2),
        status: "published".to_owned(),
        created_at: now.into(),
        updated_at: now.into(),
        deleted_at: None,
    }
}

fn comment_model(id: i64, parent_id: Option<i64>) -> comment::Model {
    comment::Model {
        id,
        article_id: 1,
        user_id: 5,
        user_name: "reader".to_owned(),
        content: "Nice".to_owned(),
        parent_id,
        created_at: Utc::now().into(),
        deleted_at: None,
    }
}

#[tokio::test]
async fn test_find_article_by_id() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![article_model(7, 3)]])
        .into_connection();

    let repo = PostgresArticleRepository::new(db);
    let article = ArticleRepository::find_by_id(&repo, 7).await.unwrap().unwrap();

    assert_eq!(article.id, 7);
    assert_eq!(article.title, "Rates explained");
    assert_eq!(article.likes_count, 3);
}

#[tokio::test]
async fn test_repositories_share_one_connection() {
    let db = Arc::new(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![article_model(7, 3)]])
            .append_query_results([vec![comment_model(4, None)]])
            .into_connection(),
    );

    let articles = PostgresArticleRepository::new(db.clone());
    let comments = PostgresCommentRepository::new(db.clone());
    assert_eq!(Arc::strong_count(&db), 3);

    let article = ArticleRepository::find_by_id(&articles, 7).await.unwrap().unwrap();
    let comment = CommentRepository::find_by_id(&comments, 4).await.unwrap().unwrap();
    assert_eq!(article.id, 7);
    assert_eq!(comment.id, 4);
}

#[tokio::test]
async fn test_list_articles_reports_total() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[BTreeMap::from([("num_items", Value::BigInt(Some(2)))])]])
        .append_query_results([vec![article_model(2, 0), article_model(1, 0)]])
        .into_connection();

    let repo = PostgresArticleRepository::new(db);
    let page = repo.list(None, PageRequest::new(Some(1), Some(10))).await.unwrap();

    assert_eq!(page.total, 2);
    assert_eq!(page.data.len(), 2);
    assert_eq!(page.data[0].id, 2);
}

#[tokio::test]
async fn test_increment_views_on_missing_article() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 0,
        }])
        .into_connection();

    let repo = PostgresArticleRepository::new(db);
    let err = repo.increment_views(99).await.unwrap_err();
    assert!(matches!(err, RepoError::NotFound));
}

#[tokio::test]
async fn test_like_toggle_inserts_and_counts() {
    let like = article_like::Model {
        user_id: 5,
        article_id: 1,
        created_at: Utc::now().into(),
    };
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        // Locked article row.
        .append_query_results([vec![article_model(1, 0)]])
        // No existing like.
        .append_query_results([Vec::<article_like::Model>::new()])
        // INSERT ... RETURNING.
        .append_query_results([vec![like]])
        // Committed count.
        .append_query_results([vec![article_model(1, 1)]])
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }])
        .into_connection();

    let repo = PostgresLikeRepository::new(db);
    let toggle = repo.toggle(5, 1).await.unwrap();

    assert!(toggle.liked);
    assert_eq!(toggle.likes_count, 1);
}

#[tokio::test]
async fn test_like_toggle_on_missing_article() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<article::Model>::new()])
        .into_connection();

    let repo = PostgresLikeRepository::new(db);
    assert!(matches!(repo.toggle(5, 1).await, Err(RepoError::NotFound)));
}

#[tokio::test]
async fn test_delete_top_level_comment_counts_replies() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![comment_model(10, None)]])
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 3,
        }])
        .into_connection();

    let repo = PostgresCommentRepository::new(db);
    assert_eq!(repo.delete_cascade(10).await.unwrap(), 3);
}

#[test]
fn test_unique_violation_maps_to_constraint() {
    let err = db_err(DbErr::Custom(
        "duplicate key value violates unique constraint \"categories_name_key\"".into(),
    ));
    assert!(matches!(err, RepoError::Constraint(_)));

    let err = db_err(DbErr::RecordNotFound("article".into()));
    assert!(matches!(err, RepoError::NotFound));
}
