//! Authentication handlers.

use actix_web::{HttpResponse, web};

use postrate_core::domain::{NewUser, Role, User};
use postrate_core::error::RepoError;
use postrate_shared::ApiResponse;
use postrate_shared::dto::{AuthResponse, LoginRequest, RegisterUserRequest, UserResponse};

use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 8;

fn user_response(user: &User) -> UserResponse {
    UserResponse {
        id: user.id,
        username: user.username.clone(),
        nickname: user.nickname.clone(),
        role: user.role.to_string(),
        created_at: user.created_at,
    }
}

fn issue_token(state: &AppState, user: &User) -> AppResult<AuthResponse> {
    let token = state
        .tokens
        .generate_token(user.id, &user.username, user.role)?;

    Ok(AuthResponse {
        access_token: token,
        token_type: "Bearer".to_string(),
        expires_in: state.tokens.expiration_seconds().max(0) as u64,
        user: user_response(user),
    })
}

/// POST /api/auth/register
pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterUserRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let username = req.username.trim();

    if username.is_empty() {
        return Err(AppError::BadRequest("Username is required".to_string()));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    if state.users.find_by_username(username).await.map_err(repo)?.is_some() {
        return Err(AppError::Conflict("Username already registered".to_string()));
    }

    let password_hash = state.passwords.hash(&req.password)?;

    // Registration never grants admin; admins are provisioned out of band.
    let user = state
        .users
        .create(NewUser {
            username: username.to_string(),
            password_hash,
            role: Role::User,
            nickname: req.nickname.filter(|n| !n.trim().is_empty()),
        })
        .await
        .map_err(repo)?;
    tracing::info!(user_id = user.id, "User registered");

    Ok(HttpResponse::Created().json(ApiResponse::ok(issue_token(&state, &user)?)))
}

/// POST /api/auth/login
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();

    let user = state
        .users
        .find_by_username(req.username.trim())
        .await
        .map_err(repo)?
        .ok_or(AppError::Unauthorized)?;

    if !state.passwords.verify(&req.password, &user.password_hash)? {
        return Err(AppError::Unauthorized);
    }

    Ok(HttpResponse::Ok().json(ApiResponse::ok(issue_token(&state, &user)?)))
}

/// GET /api/auth/me
pub async fn me(state: web::Data<AppState>, identity: Identity) -> AppResult<HttpResponse> {
    let user = state
        .users
        .find_by_id(identity.user_id)
        .await
        .map_err(repo)?
        .ok_or(AppError::Unauthorized)?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(user_response(&user))))
}

fn repo(err: RepoError) -> AppError {
    match err {
        RepoError::Constraint(_) => AppError::Conflict("Username already registered".to_string()),
        other => postrate_core::DomainError::from(other).into(),
    }
}
