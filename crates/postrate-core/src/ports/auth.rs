//! Token and password ports used by the HTTP layer to identify callers.

use crate::domain::Role;

/// What a verified bearer token says about its holder.
#[derive(Debug, Clone)]
pub struct TokenClaims {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
    /// Expiry as a unix timestamp.
    pub exp: i64,
}

/// Issues and verifies signed access tokens.
pub trait TokenService: Send + Sync {
    fn generate_token(&self, user_id: i64, username: &str, role: Role) -> Result<String, AuthError>;

    /// Reject expired, tampered or foreign-issuer tokens.
    fn validate_token(&self, token: &str) -> Result<TokenClaims, AuthError>;

    fn expiration_seconds(&self) -> i64;
}

/// One-way password storage.
pub trait PasswordService: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, AuthError>;

    /// `Ok(false)` for a wrong password; `Err` only when the stored hash is unusable.
    fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Missing authorization header")]
    MissingAuth,

    #[error("Hashing error: {0}")]
    HashingError(String),
}
