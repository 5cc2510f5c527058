use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::Utc;

use postrate_core::DomainError;
use postrate_core::ports::{ExchangeRateRepository, FastStore};
use postrate_core::services::{RateConfig, RateService, RefreshError};

use super::{Harness, StubRateSource, UnreachableFastStore};
use crate::{InMemoryDatabase, InMemoryFastStore};

const SNAPSHOT_KEY: &str = "rates:usd_base";

#[tokio::test]
async fn refresh_publishes_a_snapshot_used_for_cross_rates() {
    let h = Harness::new();

    let report = h.services.rates.refresh().await.unwrap();
    assert_eq!(report.currencies, 4);
    assert!(report.snapshot_published);

    let snapshot = h.fast.hash_get_all(SNAPSHOT_KEY).await.unwrap();
    assert_eq!(snapshot.get("JPY").map(String::as_str), Some("150"));
    assert!(snapshot.contains_key("updated_at"));

    let cross = h.services.rates.latest("eur", "JPY").await.unwrap();
    assert_eq!(cross.from_currency, "EUR");
    assert_eq!(cross.to_currency, "JPY");
    assert!((cross.rate - 150.0 / 0.9).abs() < 1e-9);

    let to_base = h.services.rates.latest("GBP", "USD").await.unwrap();
    assert!((to_base.rate - 1.25).abs() < 1e-9);
}

#[tokio::test]
async fn same_currency_needs_no_stored_rates() {
    let fast = Arc::new(UnreachableFastStore::default());
    let h = Harness::with_fast_store(fast.clone());

    let rate = h.services.rates.latest("eur", "EUR").await.unwrap();
    assert_eq!(rate.rate, 1.0);
    assert_eq!(rate.from_currency, "EUR");
    assert_eq!(fast.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.source.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_and_malformed_codes_are_rejected() {
    let h = Harness::new();
    h.services.rates.refresh().await.unwrap();

    assert!(matches!(
        h.services.rates.latest("USD", "CHF").await,
        Err(DomainError::NotFound { .. })
    ));
    assert!(matches!(
        h.services.rates.latest("US", "EUR").await,
        Err(DomainError::Validation(_))
    ));
}

#[tokio::test]
async fn queries_before_any_refresh_are_not_found() {
    let h = Harness::new();
    assert!(matches!(
        h.services.rates.latest("USD", "EUR").await,
        Err(DomainError::NotFound { .. })
    ));
}

#[tokio::test]
async fn a_failed_refresh_leaves_stored_rates_untouched() {
    let h = Harness::new();
    h.services.rates.refresh().await.unwrap();

    let rows_before = h.db.base_rates("USD").await.unwrap();
    let snapshot_before = h.fast.hash_get_all(SNAPSHOT_KEY).await.unwrap();

    h.source.fail_from_now_on();
    assert!(matches!(
        h.services.rates.refresh().await,
        Err(RefreshError::Fetch(_))
    ));

    assert_eq!(h.db.base_rates("USD").await.unwrap(), rows_before);
    assert_eq!(h.fast.hash_get_all(SNAPSHOT_KEY).await.unwrap(), snapshot_before);
    assert!(h.services.rates.latest("USD", "EUR").await.is_ok());
}

#[tokio::test]
async fn an_empty_upstream_table_is_not_stored() {
    let db = Arc::new(InMemoryDatabase::new());
    let fast = Arc::new(InMemoryFastStore::new());
    let service = RateService::new(
        Arc::new(StubRateSource::serving(&[("USD", 1.0), ("EUR", f64::NAN), ("JPY", 0.0)])),
        db.clone(),
        fast.clone(),
        RateConfig::default(),
    );

    assert!(matches!(service.refresh().await, Err(RefreshError::Empty)));
    assert!(db.base_rates("USD").await.unwrap().is_empty());
    assert!(!fast.exists(SNAPSHOT_KEY).await.unwrap());
}

#[tokio::test]
async fn a_missing_snapshot_is_rebuilt_from_stored_rows() {
    let h = Harness::new();
    h.services.rates.refresh().await.unwrap();
    h.fast.delete(&[SNAPSHOT_KEY.to_string()]).await.unwrap();

    let cross = h.services.rates.latest("EUR", "GBP").await.unwrap();
    assert!((cross.rate - 0.8 / 0.9).abs() < 1e-9);
    assert!(h.cached(SNAPSHOT_KEY).await);

    let table = h.services.rates.base_rates().await.unwrap();
    assert_eq!(table.base, "USD");
    assert_eq!(table.rates.len(), 4);
    assert_eq!(table.rates.get("USD"), Some(&1.0));
}

#[tokio::test]
async fn a_rebuilt_snapshot_never_replaces_a_newer_refresh() {
    let h = Harness::new();
    h.services.rates.refresh().await.unwrap();
    h.fast.delete(&[SNAPSHOT_KEY.to_string()]).await.unwrap();

    // The read misses the snapshot, loads the current rows and parks.
    h.rates.gate.arm();
    let rates = h.services.rates.clone();
    let reader = tokio::spawn(async move { rates.latest("USD", "EUR").await });
    h.rates.gate.reached().await;

    h.source.serve(&[("USD", 1.0), ("EUR", 0.5), ("JPY", 140.0)]);
    h.services.rates.refresh().await.unwrap();
    h.rates.gate.release();

    let answered = reader.await.unwrap().unwrap();
    assert!((answered.rate - 0.9).abs() < 1e-9);

    let snapshot = h.fast.hash_get_all(SNAPSHOT_KEY).await.unwrap();
    assert_eq!(snapshot.get("EUR").map(String::as_str), Some("0.5"));
    assert!(!snapshot.contains_key("GBP"));
    let fresh = h.services.rates.latest("USD", "EUR").await.unwrap();
    assert!((fresh.rate - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn a_malformed_snapshot_is_replaced_from_stored_rows() {
    let h = Harness::new();
    h.services.rates.refresh().await.unwrap();
    h.fast
        .hash_replace(
            SNAPSHOT_KEY,
            &[("EUR".to_string(), "lots".to_string())],
            std::time::Duration::from_secs(60),
        )
        .await
        .unwrap();

    let cross = h.services.rates.latest("USD", "JPY").await.unwrap();
    assert!((cross.rate - 150.0).abs() < 1e-9);
    let snapshot = h.fast.hash_get_all(SNAPSHOT_KEY).await.unwrap();
    assert_eq!(snapshot.get("EUR").map(String::as_str), Some("0.9"));
}

#[tokio::test]
async fn a_zero_anchor_is_reported_as_corrupt_data() {
    let h = Harness::new();
    let rates = BTreeMap::from([("USD".to_string(), 1.0), ("XXX".to_string(), 0.0)]);
    h.db.replace_base_rates("USD", &rates, Utc::now()).await.unwrap();

    assert!(matches!(
        h.services.rates.latest("XXX", "USD").await,
        Err(DomainError::Internal(_))
    ));
}

#[tokio::test]
async fn history_filters_by_pair_and_date() {
    let h = Harness::new();
    h.services.rates.refresh().await.unwrap();
    let rates = &h.services.rates;

    assert_eq!(rates.history(None, None, None, None).await.unwrap().len(), 4);

    let eur = rates.history(Some("usd"), Some("eur"), None, None).await.unwrap();
    assert_eq!(eur.len(), 1);
    assert_eq!(eur[0].to_currency, "EUR");
    assert_eq!(eur[0].from_currency, "USD");

    let today = Utc::now().date_naive().to_string();
    assert_eq!(
        rates
            .history(None, None, Some(&today), Some(&today))
            .await
            .unwrap()
            .len(),
        4
    );
    assert!(rates
        .history(None, None, Some("2999-01-01"), None)
        .await
        .unwrap()
        .is_empty());

    assert!(matches!(
        rates.history(Some("USD"), None, None, None).await,
        Err(DomainError::Validation(_))
    ));
    assert!(matches!(
        rates.history(Some("EUR"), Some("JPY"), None, None).await,
        Err(DomainError::Validation(_))
    ));
    assert!(matches!(
        rates.history(None, None, Some("01/02/2024"), None).await,
        Err(DomainError::Validation(_))
    ));
    assert!(matches!(
        rates
            .history(None, None, Some("2024-02-02"), Some("2024-02-01"))
            .await,
        Err(DomainError::Validation(_))
    ));
}
