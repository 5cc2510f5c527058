//! Exchange rates, stored anchored to a single base currency.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Every stored rate is `1 BASE_CURRENCY -> rate units of to_currency`.
pub const BASE_CURRENCY: &str = "USD";

/// A durable rate row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub id: i64,
    pub from_currency: String,
    pub to_currency: String,
    pub rate: f64,
    pub date: DateTime<Utc>,
}

/// An ISO-4217 style code: three ASCII letters, stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let code = raw.trim().to_ascii_uppercase();
        if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(DomainError::validation(format!(
                "unsupported currency code '{}'",
                raw.trim()
            )));
        }
        Ok(Self(code))
    }

    pub fn base() -> Self {
        Self(BASE_CURRENCY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The base-anchored rate table as of one refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub base: String,
    pub rates: BTreeMap<String, f64>,
    pub updated_at: DateTime<Utc>,
}

impl RateSnapshot {
    pub fn anchor(&self, code: &CurrencyCode) -> Option<f64> {
        self.rates.get(code.as_str()).copied()
    }

    /// Rate for `from -> to` derived from the two base anchors.
    pub fn cross(&self, from: &CurrencyCode, to: &CurrencyCode) -> Result<f64, DomainError> {
        let from_anchor = self
            .anchor(from)
            .ok_or_else(|| DomainError::not_found("currency", from))?;
        let to_anchor = self
            .anchor(to)
            .ok_or_else(|| DomainError::not_found("currency", to))?;
        cross_rate(from_anchor, to_anchor)
    }
}

/// `rate(from -> to) = rate(base -> to) / rate(base -> from)`.
///
/// A zero, negative or non-finite `from` anchor is corrupt data; it is
/// rejected instead of producing infinity or NaN.
pub fn cross_rate(from_anchor: f64, to_anchor: f64) -> Result<f64, DomainError> {
    if !from_anchor.is_finite() || from_anchor <= f64::EPSILON {
        return Err(DomainError::Internal(format!(
            "invalid anchor rate {from_anchor}"
        )));
    }
    if !to_anchor.is_finite() || to_anchor < 0.0 {
        return Err(DomainError::Internal(format!("invalid anchor rate {to_anchor}")));
    }
    Ok(to_anchor / from_anchor)
}

/// Result of a latest-rate query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossRate {
    pub from_currency: String,
    pub to_currency: String,
    pub rate: f64,
    pub date: DateTime<Utc>,
}

/// Filter for the rate history listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateHistoryQuery {
    pub pair: Option<(CurrencyCode, CurrencyCode)>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}
