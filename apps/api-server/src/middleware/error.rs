//! Error handling middleware - RFC 7807 compliant responses.

use actix_web::{HttpRequest, HttpResponse, ResponseError, error, http::StatusCode, web};

use postrate_core::error::DomainError;
use postrate_core::ports::AuthError;
use postrate_core::services::RefreshError;
use postrate_shared::ErrorResponse;

/// Application-level error type that converts to RFC 7807 responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = match self {
            AppError::NotFound(detail) => ErrorResponse::not_found(detail),
            AppError::BadRequest(detail) => ErrorResponse::bad_request(detail),
            AppError::Unauthorized => ErrorResponse::unauthorized(),
            AppError::Forbidden(detail) => ErrorResponse::forbidden(detail),
            AppError::Conflict(detail) => ErrorResponse::conflict(detail),
            AppError::Unavailable(detail) => ErrorResponse::service_unavailable(detail),
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal error");
                ErrorResponse::internal_error()
            }
        };

        HttpResponse::build(self.status_code()).json(error)
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { entity_type, id } => {
                AppError::NotFound(format!("{entity_type} with id {id} not found"))
            }
            DomainError::Validation(msg) => AppError::BadRequest(msg),
            DomainError::Duplicate(msg) => AppError::Conflict(msg),
            DomainError::Unauthorized => AppError::Unauthorized,
            DomainError::Forbidden(msg) => AppError::Forbidden(msg),
            DomainError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<RefreshError> for AppError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Fetch(e) => {
                AppError::Unavailable(format!("exchange rate source failed: {e}"))
            }
            RefreshError::Empty => {
                AppError::Unavailable("exchange rate source returned no usable rates".to_string())
            }
            RefreshError::Store(e) => DomainError::from(e).into(),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenExpired | AuthError::InvalidToken(_) | AuthError::MissingAuth => {
                AppError::Unauthorized
            }
            AuthError::HashingError(msg) => AppError::Internal(msg),
        }
    }
}

/// Result type alias for handlers.
pub type AppResult<T> = Result<T, AppError>;

/// Malformed JSON bodies answer with a problem document instead of plain text.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, req| bad_input(err, req))
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, req| bad_input(err, req))
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, req| bad_input(err, req))
}

fn bad_input<E>(cause: E, req: &HttpRequest) -> actix_web::Error
where
    E: std::fmt::Debug + std::fmt::Display + 'static,
{
    let body = ErrorResponse::bad_request(cause.to_string()).with_instance(req.path());
    error::InternalError::from_response(cause, HttpResponse::BadRequest().json(body)).into()
}
