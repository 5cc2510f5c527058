//! # Postrate Infrastructure
//!
//! Concrete implementations of the ports defined in `postrate-core`:
//! fast stores, durable stores, the job queue, the upstream rate source and
//! authentication.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external services, in-memory only
//! - `postgres` - PostgreSQL durable store via SeaORM
//! - `redis` - Redis fast store
//! - `http` - exchangerate-api.com rate source via reqwest
//! - `auth` - JWT + Argon2 authentication

pub mod cache;
pub mod database;
pub mod jobs;
pub mod rate_source;

#[cfg(feature = "auth")]
pub mod auth;

#[cfg(test)]
mod tests;

// Re-exports - In-Memory
pub use cache::InMemoryFastStore;
pub use database::{DatabaseConfig, InMemoryDatabase};
pub use jobs::{InMemoryJobQueue, InMemoryJobQueueConfig};

#[cfg(feature = "auth")]
pub use auth::{Argon2PasswordService, JwtConfig, JwtTokenService};

#[cfg(feature = "postgres")]
pub use database::DatabaseConnections;

#[cfg(feature = "redis")]
pub use cache::{RedisConfig, RedisFastStore};

#[cfg(feature = "http")]
pub use rate_source::{HttpRateSource, RateSourceConfig};
