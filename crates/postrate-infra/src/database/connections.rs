#[cfg(feature = "postgres")]
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "postgres")]
use sea_orm::{ConnectOptions, Database, DbConn, DbErr};

/// Configuration for the durable store.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
}

impl DatabaseConfig {
    /// Read `DATABASE_URL` and pool sizes. `None` when no database is
    /// configured, in which case the in-memory store is used.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("DATABASE_URL").ok().filter(|u| !u.trim().is_empty())?;
        Some(Self {
            url,
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100),
            min_connections: std::env::var("DB_MIN_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            connect_timeout: Duration::from_secs(10),
        })
    }
}

/// Pooled connection to the durable store.
#[cfg(feature = "postgres")]
pub struct DatabaseConnections {
    pub main: Arc<DbConn>,
}

#[cfg(feature = "postgres")]
impl DatabaseConnections {
    pub async fn init(config: &DatabaseConfig) -> Result<Self, DbErr> {
        tracing::info!("Initializing database connection...");

        let opts = ConnectOptions::new(&config.url)
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(config.connect_timeout)
            .idle_timeout(Duration::from_secs(300))
            .sqlx_logging(false)
            .to_owned();

        let main = Arc::new(Database::connect(opts).await?);
        tracing::info!("Main database connected (pool: {})", config.max_connections);

        Ok(Self { main })
    }
}
