//! Application configuration loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use postrate_core::cache::{CachePolicy, InvalidationMode};
use postrate_core::services::RateConfig;
use postrate_infra::{DatabaseConfig, InMemoryJobQueueConfig, JwtConfig};

#[cfg(feature = "redis")]
use postrate_infra::RedisConfig;

#[cfg(feature = "http")]
use postrate_infra::RateSourceConfig;

use crate::background::SchedulerConfig;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Time in-flight requests and background workers get to finish on shutdown.
    pub shutdown_grace: Duration,
    pub database: Option<DatabaseConfig>,
    #[cfg(feature = "redis")]
    pub redis: RedisConfig,
    #[cfg(feature = "http")]
    pub rate_source: RateSourceConfig,
    pub cache: CachePolicy,
    pub rates: RateConfig,
    pub jobs: InMemoryJobQueueConfig,
    pub jwt: JwtConfig,
    pub scheduler: SchedulerConfig,
    pub admin: Option<AdminBootstrap>,
}

/// Admin account created at startup when it does not exist yet.
#[derive(Clone)]
pub struct AdminBootstrap {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AdminBootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminBootstrap")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl AdminBootstrap {
    /// `ADMIN_USERNAME` and `ADMIN_PASSWORD`, both required.
    pub fn from_env() -> Option<Self> {
        let username = env::var("ADMIN_USERNAME").ok().filter(|u| !u.trim().is_empty())?;
        let password = env::var("ADMIN_PASSWORD").ok().filter(|p| !p.is_empty())?;
        Some(Self {
            username: username.trim().to_string(),
            password,
        })
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT").unwrap_or(8080),
            shutdown_grace: Duration::from_secs(parse_var("SHUTDOWN_GRACE_SECS").unwrap_or(5)),
            database: DatabaseConfig::from_env(),
            #[cfg(feature = "redis")]
            redis: RedisConfig::from_env(),
            #[cfg(feature = "http")]
            rate_source: RateSourceConfig::from_env(),
            cache: cache_policy_from_env(),
            rates: RateConfig {
                refresh_interval: Duration::from_secs(
                    parse_var::<u64>("EXCHANGE_RATE_REFRESH_HOURS")
                        .filter(|h| *h > 0)
                        .unwrap_or(24)
                        * 60
                        * 60,
                ),
            },
            jobs: InMemoryJobQueueConfig::from_env(),
            jwt: JwtConfig::from_env(),
            scheduler: SchedulerConfig::from_env(),
            admin: AdminBootstrap::from_env(),
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn cache_policy_from_env() -> CachePolicy {
    let defaults = CachePolicy::default();

    let invalidation = match env::var("CACHE_INVALIDATION") {
        Ok(raw) => raw.parse::<InvalidationMode>().unwrap_or_else(|e| {
            tracing::warn!(value = %raw, error = %e, "Ignoring CACHE_INVALIDATION");
            defaults.invalidation
        }),
        Err(_) => defaults.invalidation,
    };

    CachePolicy {
        content_ttl: parse_var("CACHE_TTL_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.content_ttl),
        likes_ttl: parse_var("LIKES_TTL_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.likes_ttl),
        scan_batch: parse_var("CACHE_SCAN_BATCH")
            .filter(|n: &usize| *n > 0)
            .unwrap_or(defaults.scan_batch),
        invalidation,
    }
}
