//! Upstream exchange-rate sources.

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::{HttpRateSource, RateSourceConfig};
