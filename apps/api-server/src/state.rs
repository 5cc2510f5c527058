//! Application state - shared across all handlers.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use postrate_core::cache::CachePolicy;
use postrate_core::domain::{NewUser, Role};
use postrate_core::ports::{
    ArticleRepository, CategoryRepository, CommentRepository, ExchangeRateRepository,
    FastStore, FavoriteRepository, JobQueue, LikeRepository, PasswordService, RateFetchError,
    RateSource, TokenService, UserRepository,
};
use postrate_core::services::{RateConfig, Services, Stores};
use postrate_infra::{
    Argon2PasswordService, DatabaseConfig, InMemoryDatabase, InMemoryFastStore, InMemoryJobQueue,
    InMemoryJobQueueConfig, JwtConfig, JwtTokenService,
};

#[cfg(feature = "postgres")]
use postrate_infra::DatabaseConnections;
#[cfg(feature = "postgres")]
use postrate_infra::database::{
    PostgresArticleRepository, PostgresCategoryRepository, PostgresCommentRepository,
    PostgresExchangeRateRepository, PostgresFavoriteRepository, PostgresLikeRepository,
    PostgresUserRepository,
};

#[cfg(feature = "redis")]
use postrate_infra::RedisFastStore;

#[cfg(feature = "http")]
use postrate_infra::HttpRateSource;

use crate::config::{AdminBootstrap, AppConfig};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub users: Arc<dyn UserRepository>,
    pub tokens: Arc<dyn TokenService>,
    pub passwords: Arc<dyn PasswordService>,
    pub queue: Arc<InMemoryJobQueue>,
    pub backends: Backends,
}

/// Which implementation backs each store, reported by the health check.
#[derive(Debug, Clone, Copy)]
pub struct Backends {
    pub durable: &'static str,
    pub fast: &'static str,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("fast store unavailable and fallback disabled: {0}")]
    FastStore(String),

    #[error("admin bootstrap failed: {0}")]
    Admin(String),
}

/// The durable repositories, all backed by the same store.
struct DurableStores {
    articles: Arc<dyn ArticleRepository>,
    comments: Arc<dyn CommentRepository>,
    likes: Arc<dyn LikeRepository>,
    favorites: Arc<dyn FavoriteRepository>,
    categories: Arc<dyn CategoryRepository>,
    rates: Arc<dyn ExchangeRateRepository>,
    users: Arc<dyn UserRepository>,
    kind: &'static str,
}

impl DurableStores {
    fn in_memory() -> Self {
        let db = Arc::new(InMemoryDatabase::new());
        Self {
            articles: db.clone(),
            comments: db.clone(),
            likes: db.clone(),
            favorites: db.clone(),
            categories: db.clone(),
            rates: db.clone(),
            users: db,
            kind: "memory",
        }
    }

    #[cfg(feature = "postgres")]
    fn postgres(connections: &DatabaseConnections) -> Self {
        let conn = connections.main.clone();
        Self {
            articles: Arc::new(PostgresArticleRepository::new(conn.clone())),
            comments: Arc::new(PostgresCommentRepository::new(conn.clone())),
            likes: Arc::new(PostgresLikeRepository::new(conn.clone())),
            favorites: Arc::new(PostgresFavoriteRepository::new(conn.clone())),
            categories: Arc::new(PostgresCategoryRepository::new(conn.clone())),
            rates: Arc::new(PostgresExchangeRateRepository::new(conn.clone())),
            users: Arc::new(PostgresUserRepository::new(conn)),
            kind: "postgres",
        }
    }
}

/// Used when no upstream is compiled in or configured; every refresh fails
/// and stored rates are kept.
struct UnconfiguredRateSource;

#[async_trait]
impl RateSource for UnconfiguredRateSource {
    async fn fetch_base_rates(
        &self,
    ) -> Result<std::collections::BTreeMap<String, f64>, RateFetchError> {
        Err(RateFetchError::Upstream(
            "no exchange rate source configured".to_string(),
        ))
    }
}

impl AppState {
    /// Connect the configured backends, falling back to in-memory stores
    /// where allowed, and start the job workers.
    pub async fn build(
        config: &AppConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(Self, Vec<JoinHandle<()>>), StartupError> {
        let durable = durable_stores(config.database.as_ref()).await;
        let (fast, fast_kind) = fast_store(config).await?;

        let state = Self::assemble(
            durable,
            fast,
            fast_kind,
            rate_source(config),
            config.cache.clone(),
            config.rates.clone(),
            config.jobs.clone(),
            config.jwt.clone(),
        );
        let workers = state
            .queue
            .start_workers(state.services.jobs.handler(), shutdown);

        tracing::info!(
            durable_store = state.backends.durable,
            fast_store = state.backends.fast,
            invalidation = %config.cache.invalidation,
            workers = workers.len(),
            "Application state initialized"
        );
        Ok((state, workers))
    }

    /// Create the configured admin account unless the username is taken.
    pub async fn ensure_admin(&self, admin: &AdminBootstrap) -> Result<(), StartupError> {
        let existing = self
            .users
            .find_by_username(&admin.username)
            .await
            .map_err(|e| StartupError::Admin(e.to_string()))?;
        if let Some(user) = existing {
            if user.role != Role::Admin {
                tracing::warn!(username = %admin.username, "Bootstrap admin name belongs to a non-admin user");
            }
            return Ok(());
        }

        let password_hash = self
            .passwords
            .hash(&admin.password)
            .map_err(|e| StartupError::Admin(e.to_string()))?;
        let user = self
            .users
            .create(NewUser {
                username: admin.username.clone(),
                password_hash,
                role: Role::Admin,
                nickname: None,
            })
            .await
            .map_err(|e| StartupError::Admin(e.to_string()))?;
        tracing::info!(user_id = user.id, username = %user.username, "Admin account created");
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        durable: DurableStores,
        fast: Arc<dyn FastStore>,
        fast_kind: &'static str,
        rate_source: Arc<dyn RateSource>,
        policy: CachePolicy,
        rates: RateConfig,
        jobs: InMemoryJobQueueConfig,
        jwt: JwtConfig,
    ) -> Self {
        let queue = Arc::new(InMemoryJobQueue::new(jobs));
        let job_queue: Arc<dyn JobQueue> = queue.clone();

        let stores = Stores {
            articles: durable.articles,
            comments: durable.comments,
            likes: durable.likes,
            favorites: durable.favorites,
            categories: durable.categories,
            rates: durable.rates,
            users: durable.users.clone(),
            fast,
            queue: job_queue,
        };

        Self {
            services: Services::new(stores, policy, rates, rate_source),
            users: durable.users,
            tokens: Arc::new(JwtTokenService::new(jwt)),
            passwords: Arc::new(Argon2PasswordService::new()),
            queue,
            backends: Backends {
                durable: durable.kind,
                fast: fast_kind,
            },
        }
    }

    /// Everything in memory with synchronous invalidation; the caller keeps
    /// the returned sender alive for as long as the workers should run.
    #[cfg(test)]
    pub fn in_memory(rate_source: Arc<dyn RateSource>) -> (Self, watch::Sender<bool>) {
        let policy = CachePolicy {
            invalidation: postrate_core::cache::InvalidationMode::Sync,
            ..Default::default()
        };
        let state = Self::assemble(
            DurableStores::in_memory(),
            Arc::new(InMemoryFastStore::new()),
            "memory",
            rate_source,
            policy,
            RateConfig::default(),
            InMemoryJobQueueConfig::default(),
            JwtConfig::default(),
        );
        let (tx, rx) = watch::channel(false);
        state.queue.start_workers(state.services.jobs.handler(), rx);
        (state, tx)
    }
}

#[cfg(feature = "postgres")]
async fn durable_stores(config: Option<&DatabaseConfig>) -> DurableStores {
    let Some(config) = config else {
        tracing::warn!("DATABASE_URL not set. Running without database (in-memory mode).");
        return DurableStores::in_memory();
    };

    match DatabaseConnections::init(config).await {
        Ok(connections) => DurableStores::postgres(&connections),
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to database. Using in-memory fallback.");
            DurableStores::in_memory()
        }
    }
}

#[cfg(not(feature = "postgres"))]
async fn durable_stores(config: Option<&DatabaseConfig>) -> DurableStores {
    if config.is_some() {
        tracing::warn!("DATABASE_URL ignored: built without the postgres feature");
    }
    DurableStores::in_memory()
}

#[cfg(feature = "redis")]
async fn fast_store(
    config: &AppConfig,
) -> Result<(Arc<dyn FastStore>, &'static str), StartupError> {
    match RedisFastStore::new(&config.redis).await {
        Ok(store) => Ok((Arc::new(store), "redis")),
        Err(e) if config.redis.fallback_to_memory => {
            tracing::warn!(error = %e, "Redis unavailable. Using in-memory fast store.");
            Ok((Arc::new(InMemoryFastStore::new()), "memory"))
        }
        Err(e) => Err(StartupError::FastStore(e.to_string())),
    }
}

#[cfg(not(feature = "redis"))]
async fn fast_store(
    _config: &AppConfig,
) -> Result<(Arc<dyn FastStore>, &'static str), StartupError> {
    Ok((Arc::new(InMemoryFastStore::new()), "memory"))
}

#[cfg(feature = "http")]
fn rate_source(config: &AppConfig) -> Arc<dyn RateSource> {
    match HttpRateSource::new(config.rate_source.clone()) {
        Ok(source) => Arc::new(source),
        Err(e) => {
            tracing::error!(error = %e, "Exchange rate client not built; refreshes will fail");
            Arc::new(UnconfiguredRateSource)
        }
    }
}

#[cfg(not(feature = "http"))]
fn rate_source(_config: &AppConfig) -> Arc<dyn RateSource> {
    Arc::new(UnconfiguredRateSource)
}
