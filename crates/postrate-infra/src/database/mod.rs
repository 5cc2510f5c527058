//! Durable store: PostgreSQL through SeaORM, plus an in-memory implementation
//! used when no database is configured and in tests.

mod connections;
mod memory;

#[cfg(feature = "postgres")]
mod postgres_base;
#[cfg(feature = "postgres")]
pub mod postgres_repo;

#[cfg(feature = "postgres")]
pub mod entity;

pub use connections::DatabaseConfig;
pub use memory::InMemoryDatabase;

#[cfg(feature = "postgres")]
pub use connections::DatabaseConnections;

#[cfg(feature = "postgres")]
pub use postgres_base::PostgresRepository;

#[cfg(feature = "postgres")]
pub use postgres_repo::{
    PostgresArticleRepository, PostgresCategoryRepository, PostgresCommentRepository,
    PostgresExchangeRateRepository, PostgresFavoriteRepository, PostgresLikeRepository,
    PostgresUserRepository,
};

#[cfg(feature = "postgres")]
#[cfg(test)]
mod tests;
