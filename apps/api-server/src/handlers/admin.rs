//! Admin-only content management and the manual rate refresh.

use actix_web::{HttpResponse, web};

use postrate_core::domain::{ArticleDraft, ArticleStatus};
use postrate_shared::ApiResponse;
use postrate_shared::dto::{ArticleRequest, CategoryRequest, RefreshResponse};

use crate::middleware::auth::Identity;
use crate::middleware::error::AppResult;
use crate::state::AppState;

fn draft(req: ArticleRequest) -> AppResult<ArticleDraft> {
    let status = match req.status.as_deref().map(str::trim) {
        None | Some("") => ArticleStatus::default(),
        Some(raw) => raw.parse::<ArticleStatus>()?,
    };
    Ok(ArticleDraft {
        title: req.title,
        content: req.content,
        preview: req.preview,
        cover: req.cover.filter(|c| !c.trim().is_empty()),
        category_id: req.category_id,
        status,
    })
}

/// POST /api/admin/articles
pub async fn create_article(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<ArticleRequest>,
) -> AppResult<HttpResponse> {
    let article = state
        .services
        .articles
        .create(&identity.actor(), draft(body.into_inner())?)
        .await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(article)))
}

/// PUT /api/admin/articles/{id}
pub async fn update_article(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<i64>,
    body: web::Json<ArticleRequest>,
) -> AppResult<HttpResponse> {
    let article = state
        .services
        .articles
        .update(&identity.actor(), path.into_inner(), draft(body.into_inner())?)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(article)))
}

/// DELETE /api/admin/articles/{id}
pub async fn delete_article(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    state
        .services
        .articles
        .delete(&identity.actor(), path.into_inner())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/admin/categories
pub async fn create_category(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<CategoryRequest>,
) -> AppResult<HttpResponse> {
    let category = state
        .services
        .categories
        .create(&identity.actor(), &body.name)
        .await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(category)))
}

/// DELETE /api/admin/categories/{id}
pub async fn delete_category(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    state
        .services
        .categories
        .delete(&identity.actor(), path.into_inner())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/admin/exchange-rates/refresh
pub async fn refresh_rates(
    state: web::Data<AppState>,
    identity: Identity,
) -> AppResult<HttpResponse> {
    identity.require_admin()?;
    tracing::info!(user_id = identity.user_id, "Manual exchange rate refresh");

    let report = state.services.rates.refresh().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(RefreshResponse {
        currencies: report.currencies,
        updated_at: report.updated_at,
        snapshot_published: report.snapshot_published,
    })))
}
