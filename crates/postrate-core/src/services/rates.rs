//! Exchange-rate refresh pipeline and cross-rate queries.
//!
//! Refresh: fetch base rates upstream, replace the durable rows in one
//! transaction, then publish the table as the `rates:usd_base` hash.
//! Reads prefer that hash and fall back to the durable rows.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};

use crate::cache::CacheKey;
use crate::domain::{
    BASE_CURRENCY, CrossRate, CurrencyCode, ExchangeRate, RateHistoryQuery, RateSnapshot,
};
use crate::error::{DomainError, RepoError};
use crate::ports::{ExchangeRateRepository, FastStore, RateFetchError, RateSource};

/// Snapshot field holding the refresh time; every other field is a currency.
const UPDATED_AT_FIELD: &str = "updated_at";

#[derive(Debug, Clone)]
pub struct RateConfig {
    pub refresh_interval: Duration,
}

impl RateConfig {
    /// Snapshots outlive one refresh interval by an hour so a slow cycle does
    /// not leave reads without a snapshot.
    pub fn snapshot_ttl(&self) -> Duration {
        self.refresh_interval + Duration::from_secs(60 * 60)
    }
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Why a refresh cycle stopped. Stored state is untouched in every case
/// except a failed snapshot publish, which is not an error.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("fetching rates failed: {0}")]
    Fetch(#[from] RateFetchError),

    #[error("upstream returned no usable rates")]
    Empty,

    #[error("storing rates failed: {0}")]
    Store(#[from] RepoError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshReport {
    pub currencies: usize,
    pub updated_at: DateTime<Utc>,
    pub snapshot_published: bool,
}

#[derive(Clone)]
pub struct RateService {
    source: Arc<dyn RateSource>,
    repo: Arc<dyn ExchangeRateRepository>,
    fast: Arc<dyn FastStore>,
    config: RateConfig,
}

impl RateService {
    pub fn new(
        source: Arc<dyn RateSource>,
        repo: Arc<dyn ExchangeRateRepository>,
        fast: Arc<dyn FastStore>,
        config: RateConfig,
    ) -> Self {
        Self {
            source,
            repo,
            fast,
            config,
        }
    }

    pub fn config(&self) -> &RateConfig {
        &self.config
    }

    /// Run one refresh cycle.
    pub async fn refresh(&self) -> Result<RefreshReport, RefreshError> {
        let fetched = self.source.fetch_base_rates().await.map_err(|e| {
            tracing::warn!(error = %e, "Exchange rate fetch failed, keeping stored rates");
            e
        })?;

        let rates = sanitize(fetched)?;
        let updated_at = Utc::now();

        let stored = self
            .repo
            .replace_base_rates(BASE_CURRENCY, &rates, updated_at)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Exchange rate replace failed, transaction rolled back");
                e
            })?;

        let snapshot = RateSnapshot {
            base: BASE_CURRENCY.to_string(),
            rates,
            updated_at,
        };
        let snapshot_published = self.publish(&snapshot).await;

        tracing::info!(currencies = stored, snapshot_published, "Exchange rates refreshed");
        Ok(RefreshReport {
            currencies: stored,
            updated_at,
            snapshot_published,
        })
    }

    /// Replace the fast-store snapshot. On failure the old snapshot is
    /// dropped so reads fall back to the durable rows instead of stale data.
    async fn publish(&self, snapshot: &RateSnapshot) -> bool {
        let key = CacheKey::RateSnapshot.to_string();
        match self
            .fast
            .hash_replace(&key, &snapshot_fields(snapshot), self.config.snapshot_ttl())
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Rate snapshot not published");
                if let Err(e) = self.fast.delete(&[key.clone()]).await {
                    tracing::warn!(key = %key, error = %e, "Stale rate snapshot not removed");
                }
                false
            }
        }
    }

    /// Rate for converting one unit of `from` into `to`.
    pub async fn latest(&self, from: &str, to: &str) -> Result<CrossRate, DomainError> {
        let from = CurrencyCode::parse(from)?;
        let to = CurrencyCode::parse(to)?;

        if from == to {
            return Ok(CrossRate {
                from_currency: from.to_string(),
                to_currency: to.to_string(),
                rate: 1.0,
                date: Utc::now(),
            });
        }

        let snapshot = self.snapshot().await?;
        let rate = snapshot.cross(&from, &to)?;
        Ok(CrossRate {
            from_currency: from.to_string(),
            to_currency: to.to_string(),
            rate,
            date: snapshot.updated_at,
        })
    }

    /// The whole base-anchored table.
    pub async fn base_rates(&self) -> Result<RateSnapshot, DomainError> {
        self.snapshot().await
    }

    /// Stored rows, newest first. `from` and `to` must be given together and
    /// `from` must be the base currency, the only anchor rows are stored for;
    /// dates are `YYYY-MM-DD` and inclusive.
    pub async fn history(
        &self,
        from: Option<&str>,
        to: Option<&str>,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Vec<ExchangeRate>, DomainError> {
        let pair = match (blank_to_none(from), blank_to_none(to)) {
            (Some(from), Some(to)) => {
                let from = CurrencyCode::parse(from)?;
                if from.as_str() != BASE_CURRENCY {
                    return Err(DomainError::validation(format!(
                        "from must be {BASE_CURRENCY}, the only stored anchor"
                    )));
                }
                Some((from, CurrencyCode::parse(to)?))
            }
            (None, None) => None,
            _ => {
                return Err(DomainError::validation(
                    "from and to must be supplied together",
                ));
            }
        };
        let query = RateHistoryQuery {
            pair,
            start: parse_date("start", start)?,
            end: parse_date("end", end)?,
        };
        if let (Some(start), Some(end)) = (query.start, query.end) {
            if start > end {
                return Err(DomainError::validation("start must not be after end"));
            }
        }

        Ok(self.repo.history(&query).await?)
    }

    async fn snapshot(&self) -> Result<RateSnapshot, DomainError> {
        let key = CacheKey::RateSnapshot.to_string();
        match self.fast.hash_get_all(&key).await {
            Ok(fields) if !fields.is_empty() => match decode_snapshot(fields) {
                Some(snapshot) => {
                    tracing::debug!(key = %key, "Rate snapshot hit");
                    return Ok(snapshot);
                }
                None => {
                    tracing::warn!(key = %key, "Discarding malformed rate snapshot");
                    if let Err(e) = self.fast.delete(&[key.clone()]).await {
                        tracing::warn!(key = %key, error = %e, "Malformed rate snapshot not removed");
                    }
                }
            },
            Ok(_) => tracing::debug!(key = %key, "Rate snapshot miss"),
            Err(e) => tracing::warn!(key = %key, error = %e, "Rate snapshot read failed"),
        }

        let rows = self.repo.base_rates(BASE_CURRENCY).await?;
        if rows.is_empty() {
            return Err(DomainError::not_found("exchange rates", BASE_CURRENCY));
        }

        let updated_at = rows.iter().map(|r| r.date).max().unwrap_or_else(Utc::now);
        let rates = rows
            .into_iter()
            .map(|r| (r.to_currency, r.rate))
            .collect::<BTreeMap<_, _>>();
        let snapshot = RateSnapshot {
            base: BASE_CURRENCY.to_string(),
            rates,
            updated_at,
        };
        // A refresh may have published between our miss and now; never
        // overwrite its snapshot with the rows read before it.
        match self
            .fast
            .hash_insert_if_absent(&key, &snapshot_fields(&snapshot), self.config.snapshot_ttl())
            .await
        {
            Ok(true) => tracing::debug!(key = %key, "Rate snapshot rebuilt from stored rows"),
            Ok(false) => tracing::debug!(key = %key, "Rate snapshot already published"),
            Err(e) => tracing::warn!(key = %key, error = %e, "Rate snapshot not rebuilt"),
        }
        Ok(snapshot)
    }
}

fn snapshot_fields(snapshot: &RateSnapshot) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = snapshot
        .rates
        .iter()
        .map(|(code, rate)| (code.clone(), rate.to_string()))
        .collect();
    fields.push((UPDATED_AT_FIELD.to_string(), snapshot.updated_at.to_rfc3339()));
    fields
}

/// Keep positive finite rates and pin the base currency to exactly 1.
fn sanitize(fetched: BTreeMap<String, f64>) -> Result<BTreeMap<String, f64>, RefreshError> {
    let mut rates = BTreeMap::new();
    for (code, rate) in fetched {
        let Ok(code) = CurrencyCode::parse(&code) else {
            tracing::warn!(code = %code, "Skipping malformed currency code");
            continue;
        };
        if !rate.is_finite() || rate <= 0.0 {
            tracing::warn!(code = %code, rate, "Skipping invalid rate");
            continue;
        }
        rates.insert(code.to_string(), rate);
    }

    if rates.keys().all(|code| code == BASE_CURRENCY) {
        return Err(RefreshError::Empty);
    }
    rates.insert(BASE_CURRENCY.to_string(), 1.0);
    Ok(rates)
}

fn decode_snapshot(mut fields: HashMap<String, String>) -> Option<RateSnapshot> {
    let updated_at = fields
        .remove(UPDATED_AT_FIELD)
        .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
        .map(|ts| ts.with_timezone(&Utc))?;

    let rates = fields
        .into_iter()
        .map(|(code, raw)| raw.parse::<f64>().ok().map(|rate| (code, rate)))
        .collect::<Option<BTreeMap<_, _>>>()?;

    Some(RateSnapshot {
        base: BASE_CURRENCY.to_string(),
        rates,
        updated_at,
    })
}

fn blank_to_none(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, DomainError> {
    blank_to_none(value)
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                DomainError::validation(format!("{field} must be a YYYY-MM-DD date"))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_drops_bad_entries_and_pins_base() {
        let fetched = BTreeMap::from([
            ("USD".to_string(), 0.99),
            ("eur".to_string(), 0.9),
            ("JPY".to_string(), 150.0),
            ("BAD".to_string(), 0.0),
            ("NAN".to_string(), f64::NAN),
            ("TOOLONG".to_string(), 2.0),
        ]);
        let rates = sanitize(fetched).unwrap();
        assert_eq!(rates.len(), 3);
        assert_eq!(rates["USD"], 1.0);
        assert_eq!(rates["EUR"], 0.9);
    }

    #[test]
    fn sanitize_rejects_empty_tables() {
        assert!(matches!(sanitize(BTreeMap::new()), Err(RefreshError::Empty)));
        let only_base = BTreeMap::from([("USD".to_string(), 1.0)]);
        assert!(matches!(sanitize(only_base), Err(RefreshError::Empty)));
    }

    #[test]
    fn snapshot_decoding_requires_a_timestamp() {
        let mut fields = HashMap::from([("EUR".to_string(), "0.9".to_string())]);
        assert!(decode_snapshot(fields.clone()).is_none());

        fields.insert(UPDATED_AT_FIELD.into(), "2026-01-02T03:04:05+00:00".into());
        let snap = decode_snapshot(fields).unwrap();
        assert_eq!(snap.rates["EUR"], 0.9);
        assert!(!snap.rates.contains_key(UPDATED_AT_FIELD));
    }

    #[test]
    fn history_dates_must_be_iso() {
        assert!(parse_date("start", Some("2026-13-01")).is_err());
        assert_eq!(
            parse_date("start", Some("2026-01-31")).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 31)
        );
        assert_eq!(parse_date("end", Some("  ")).unwrap(), None);
    }

    #[test]
    fn snapshot_ttl_exceeds_the_interval() {
        let config = RateConfig::default();
        assert!(config.snapshot_ttl() > config.refresh_interval);
    }
}
