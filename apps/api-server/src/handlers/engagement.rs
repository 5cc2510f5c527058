//! Likes, favorites and comment writes. Everything here except the like
//! summary needs a signed-in caller.

use actix_web::{HttpResponse, web};

use postrate_core::domain::CommentDraft;
use postrate_shared::ApiResponse;
use postrate_shared::dto::{CommentRequest, FavoriteToggleResponse, LikeToggleResponse};

use crate::middleware::auth::{Identity, OptionalIdentity};
use crate::middleware::error::AppResult;
use crate::state::AppState;

/// GET /api/articles/{id}/like
pub async fn like_summary(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    identity: OptionalIdentity,
) -> AppResult<HttpResponse> {
    let user_id = identity.0.map(|i| i.user_id);
    let summary = state
        .services
        .engagement
        .like_summary(path.into_inner(), user_id)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(summary)))
}

/// POST /api/articles/{id}/like
pub async fn toggle_like(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    identity: Identity,
) -> AppResult<HttpResponse> {
    let toggle = state
        .services
        .engagement
        .toggle_like(identity.user_id, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(LikeToggleResponse {
        liked: toggle.liked,
        likes_count: toggle.likes_count,
    })))
}

/// POST /api/articles/{id}/favorite
pub async fn toggle_favorite(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    identity: Identity,
) -> AppResult<HttpResponse> {
    let toggle = state
        .services
        .engagement
        .toggle_favorite(identity.user_id, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(FavoriteToggleResponse {
        favorited: toggle.favorited,
    })))
}

/// GET /api/user/favorites
pub async fn favorites(state: web::Data<AppState>, identity: Identity) -> AppResult<HttpResponse> {
    let favorites = state.services.engagement.favorites(identity.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(favorites)))
}

/// DELETE /api/favorites/{id}
pub async fn remove_favorite(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    identity: Identity,
) -> AppResult<HttpResponse> {
    state
        .services
        .engagement
        .remove_favorite(identity.user_id, path.into_inner())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/articles/{id}/comments
pub async fn create_comment(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    identity: Identity,
    body: web::Json<CommentRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let comment = state
        .services
        .comments
        .create(
            &identity.actor(),
            path.into_inner(),
            CommentDraft {
                content: req.content,
                parent_id: req.parent_id,
            },
        )
        .await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(comment)))
}

/// DELETE /api/comments/{id}
pub async fn delete_comment(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    identity: Identity,
) -> AppResult<HttpResponse> {
    let removed = state
        .services
        .comments
        .delete(&identity.actor(), path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok_with_message(
        removed,
        format!("{removed} comment(s) deleted"),
    )))
}
