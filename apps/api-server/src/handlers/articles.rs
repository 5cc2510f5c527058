//! Public article, comment-listing and category reads.

use actix_web::{HttpResponse, web};

use postrate_core::domain::PageRequest;
use postrate_shared::dto::PageQuery;
use postrate_shared::{ApiResponse, Paginated};

use crate::middleware::error::AppResult;
use crate::state::AppState;

/// GET /api/articles?page&limit&category
pub async fn list(
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let page = PageRequest::new(query.page, query.limit);
    let result = state.services.articles.list(query.category, page).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(Paginated {
        data: result.data,
        total: result.total,
        page: page.page(),
        limit: page.limit(),
    })))
}

/// GET /api/articles/hot
pub async fn hot(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let articles = state.services.articles.hot().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(articles)))
}

/// GET /api/articles/{id}
pub async fn detail(state: web::Data<AppState>, path: web::Path<i64>) -> AppResult<HttpResponse> {
    let article = state.services.articles.detail(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(article)))
}

/// GET /api/articles/{id}/comments?page&limit
pub async fn comments(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let page = PageRequest::new(query.page, query.limit);
    let comments = state.services.comments.page(path.into_inner(), page).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(comments)))
}

/// GET /api/categories
pub async fn categories(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let categories = state.services.categories.list().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(categories)))
}
