//! exchangerate-api.com v6 client.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use postrate_core::ports::{RateFetchError, RateSource};

const DEFAULT_URL: &str = "https://v6.exchangerate-api.com/v6/{key}/latest/USD";

#[derive(Debug, Clone)]
pub struct RateSourceConfig {
    /// Endpoint; `{key}` is replaced with `api_key`.
    pub url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for RateSourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl RateSourceConfig {
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("EXCHANGE_RATE_API_URL").unwrap_or_else(|_| DEFAULT_URL.to_string()),
            api_key: std::env::var("EXCHANGE_RATE_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            timeout: Duration::from_secs(
                std::env::var("EXCHANGE_RATE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
        }
    }

    fn endpoint(&self) -> Result<String, RateFetchError> {
        if !self.url.contains("{key}") {
            return Ok(self.url.clone());
        }
        match &self.api_key {
            Some(key) => Ok(self.url.replace("{key}", key)),
            None => Err(RateFetchError::Upstream(
                "EXCHANGE_RATE_API_KEY is not set".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    result: String,
    #[serde(default, rename = "error-type")]
    error_type: Option<String>,
    #[serde(default)]
    conversion_rates: BTreeMap<String, f64>,
}

/// Single-attempt HTTP rate source.
pub struct HttpRateSource {
    client: reqwest::Client,
    config: RateSourceConfig,
}

impl HttpRateSource {
    pub fn new(config: RateSourceConfig) -> Result<Self, RateFetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RateFetchError::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self, RateFetchError> {
        Self::new(RateSourceConfig::from_env())
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch_base_rates(&self) -> Result<BTreeMap<String, f64>, RateFetchError> {
        let url = self.config.endpoint()?;

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                RateFetchError::Timeout
            } else {
                RateFetchError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RateFetchError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                RateFetchError::Timeout
            } else {
                RateFetchError::Network(e.to_string())
            }
        })?;

        let rates = parse_latest(&body)?;
        tracing::debug!(currencies = rates.len(), "Fetched upstream exchange rates");
        Ok(rates)
    }
}

fn parse_latest(body: &str) -> Result<BTreeMap<String, f64>, RateFetchError> {
    let payload: LatestResponse =
        serde_json::from_str(body).map_err(|e| RateFetchError::Payload(e.to_string()))?;

    if payload.result != "success" {
        let reason = payload.error_type.unwrap_or(payload.result);
        return Err(RateFetchError::Upstream(reason));
    }
    Ok(payload.conversion_rates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_success_payload() {
        let body = r#"{
            "result": "success",
            "base_code": "USD",
            "conversion_rates": {"USD": 1, "EUR": 0.9, "JPY": 150.0}
        }"#;
        let rates = parse_latest(body).unwrap();
        assert_eq!(rates.len(), 3);
        assert_eq!(rates["EUR"], 0.9);
    }

    #[test]
    fn test_parse_upstream_error() {
        let body = r#"{"result": "error", "error-type": "invalid-key"}"#;
        match parse_latest(body) {
            Err(RateFetchError::Upstream(reason)) => assert_eq!(reason, "invalid-key"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_malformed_payload() {
        assert!(matches!(parse_latest("<html>"), Err(RateFetchError::Payload(_))));
    }

    #[test]
    fn test_endpoint_requires_key_for_template() {
        let config = RateSourceConfig::default();
        assert!(matches!(config.endpoint(), Err(RateFetchError::Upstream(_))));

        let config = RateSourceConfig {
            api_key: Some("abc".into()),
            ..Default::default()
        };
        assert_eq!(
            config.endpoint().unwrap(),
            "https://v6.exchangerate-api.com/v6/abc/latest/USD"
        );
    }
}
