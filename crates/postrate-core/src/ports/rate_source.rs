//! Upstream exchange-rate source port.

use std::collections::BTreeMap;

use async_trait::async_trait;

/// Source of base-anchored rates (`1 USD -> n units`).
///
/// Implementations perform a single attempt; a retrying wrapper can implement
/// this same trait.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_base_rates(&self) -> Result<BTreeMap<String, f64>, RateFetchError>;
}

/// Upstream fetch failures. All of them abort the refresh cycle.
#[derive(Debug, thiserror::Error)]
pub enum RateFetchError {
    #[error("Request failed: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Upstream returned HTTP {0}")]
    Status(u16),

    #[error("Malformed payload: {0}")]
    Payload(String),

    #[error("Upstream reported failure: {0}")]
    Upstream(String),
}
