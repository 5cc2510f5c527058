//! Scenario tests: core services wired to the in-memory backends.

mod exchange_rates;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Notify, watch};

use postrate_core::cache::{CachePolicy, InvalidationMode};
use postrate_core::domain::{
    Actor, Article, ArticleDraft, ArticlePage, ArticleStatus, ExchangeRate, LikeToggle, NewUser,
    PageRequest, RateHistoryQuery, Role,
};
use postrate_core::error::RepoError;
use postrate_core::ports::{
    ArticleRepository, CacheError, ExchangeRateRepository, FastStore, JobQueue, LikeRepository,
    RateFetchError, RateSource, SetOp, UserRepository,
};
use postrate_core::services::{RateConfig, Services, Stores};

use crate::{InMemoryDatabase, InMemoryFastStore, InMemoryJobQueue, InMemoryJobQueueConfig};

/// Parks the next gated read after it has completed, until released, so a
/// write can be slipped in between a durable read and the cache fill that
/// follows it.
#[derive(Default)]
pub(crate) struct ReadGate {
    armed: AtomicBool,
    reached: Notify,
    released: Notify,
}

impl ReadGate {
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Resolves once the armed read has completed and is parked.
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    pub fn release(&self) {
        self.released.notify_one();
    }

    async fn pass(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.reached.notify_one();
            self.released.notified().await;
        }
    }
}

/// Counts reads that reach the durable article store; `find_by_id` is gated.
pub(crate) struct CountingArticles {
    inner: Arc<InMemoryDatabase>,
    pub list_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
    pub hot_calls: AtomicUsize,
    pub gate: ReadGate,
}

impl CountingArticles {
    fn new(inner: Arc<InMemoryDatabase>) -> Self {
        Self {
            inner,
            list_calls: AtomicUsize::new(0),
            detail_calls: AtomicUsize::new(0),
            hot_calls: AtomicUsize::new(0),
            gate: ReadGate::default(),
        }
    }
}

#[async_trait]
impl ArticleRepository for CountingArticles {
    async fn find_by_id(&self, id: i64) -> Result<Option<Article>, RepoError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        let found = ArticleRepository::find_by_id(self.inner.as_ref(), id).await;
        self.gate.pass().await;
        found
    }

    async fn list(
        &self,
        category_id: Option<i64>,
        page: PageRequest,
    ) -> Result<ArticlePage, RepoError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        ArticleRepository::list(self.inner.as_ref(), category_id, page).await
    }

    async fn hot(&self, limit: u64) -> Result<Vec<Article>, RepoError> {
        self.hot_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.hot(limit).await
    }

    async fn create(&self, author_id: i64, draft: ArticleDraft) -> Result<Article, RepoError> {
        ArticleRepository::create(self.inner.as_ref(), author_id, draft).await
    }

    async fn update(&self, id: i64, draft: ArticleDraft) -> Result<Article, RepoError> {
        ArticleRepository::update(self.inner.as_ref(), id, draft).await
    }

    async fn delete_cascade(&self, id: i64) -> Result<(), RepoError> {
        ArticleRepository::delete_cascade(self.inner.as_ref(), id).await
    }

    async fn increment_views(&self, id: i64) -> Result<(), RepoError> {
        self.inner.increment_views(id).await
    }
}

/// Like store whose `liked_user_ids` is gated.
pub(crate) struct GatedLikes {
    inner: Arc<InMemoryDatabase>,
    pub gate: ReadGate,
}

#[async_trait]
impl LikeRepository for GatedLikes {
    async fn toggle(&self, user_id: i64, article_id: i64) -> Result<LikeToggle, RepoError> {
        LikeRepository::toggle(self.inner.as_ref(), user_id, article_id).await
    }

    async fn exists(&self, user_id: i64, article_id: i64) -> Result<bool, RepoError> {
        LikeRepository::exists(self.inner.as_ref(), user_id, article_id).await
    }

    async fn liked_user_ids(&self, article_id: i64) -> Result<Vec<i64>, RepoError> {
        let ids = self.inner.liked_user_ids(article_id).await;
        self.gate.pass().await;
        ids
    }
}

/// Rate store whose `base_rates` is gated.
pub(crate) struct GatedRates {
    inner: Arc<InMemoryDatabase>,
    pub gate: ReadGate,
}

#[async_trait]
impl ExchangeRateRepository for GatedRates {
    async fn replace_base_rates(
        &self,
        base: &str,
        rates: &BTreeMap<String, f64>,
        date: DateTime<Utc>,
    ) -> Result<usize, RepoError> {
        self.inner.replace_base_rates(base, rates, date).await
    }

    async fn base_rates(&self, base: &str) -> Result<Vec<ExchangeRate>, RepoError> {
        let rows = self.inner.base_rates(base).await;
        self.gate.pass().await;
        rows
    }

    async fn history(&self, query: &RateHistoryQuery) -> Result<Vec<ExchangeRate>, RepoError> {
        self.inner.history(query).await
    }
}

/// A fast store whose every call fails, counting the attempts.
#[derive(Default)]
pub(crate) struct UnreachableFastStore {
    pub calls: AtomicUsize,
}

impl UnreachableFastStore {
    fn fail<T>(&self) -> Result<T, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Connection("connection refused".into()))
    }
}

#[async_trait]
impl FastStore for UnreachableFastStore {
    async fn get(&self, _: &str) -> Result<Option<String>, CacheError> {
        self.fail()
    }
    async fn set(&self, _: &str, _: &str, _: Option<Duration>) -> Result<(), CacheError> {
        self.fail()
    }
    async fn delete(&self, _: &[String]) -> Result<u64, CacheError> {
        self.fail()
    }
    async fn exists(&self, _: &str) -> Result<bool, CacheError> {
        self.fail()
    }
    async fn incr_if_present(&self, _: &str, _: i64, _: Duration) -> Result<Option<i64>, CacheError> {
        self.fail()
    }
    async fn set_update_if_present(
        &self,
        _: &str,
        _: &str,
        _: SetOp,
        _: Duration,
    ) -> Result<Option<u64>, CacheError> {
        self.fail()
    }
    async fn set_membership(&self, _: &str, _: &str) -> Result<Option<bool>, CacheError> {
        self.fail()
    }
    async fn set_replace(&self, _: &str, _: &[String], _: Duration) -> Result<(), CacheError> {
        self.fail()
    }
    async fn hash_replace(
        &self,
        _: &str,
        _: &[(String, String)],
        _: Duration,
    ) -> Result<(), CacheError> {
        self.fail()
    }
    async fn hash_insert_if_absent(
        &self,
        _: &str,
        _: &[(String, String)],
        _: Duration,
    ) -> Result<bool, CacheError> {
        self.fail()
    }
    async fn hash_get_all(&self, _: &str) -> Result<HashMap<String, String>, CacheError> {
        self.fail()
    }
    async fn scan(&self, _: u64, _: &str, _: usize) -> Result<(u64, Vec<String>), CacheError> {
        self.fail()
    }
}

/// Upstream stub: serves a fixed table, or fails when `None`.
pub(crate) struct StubRateSource {
    rates: std::sync::Mutex<Option<BTreeMap<String, f64>>>,
    pub calls: AtomicUsize,
}

impl StubRateSource {
    pub fn serving(rates: &[(&str, f64)]) -> Self {
        let table = rates.iter().map(|(c, r)| (c.to_string(), *r)).collect();
        Self {
            rates: std::sync::Mutex::new(Some(table)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn serve(&self, rates: &[(&str, f64)]) {
        if let Ok(mut table) = self.rates.lock() {
            *table = Some(rates.iter().map(|(c, r)| (c.to_string(), *r)).collect());
        }
    }

    pub fn fail_from_now_on(&self) {
        if let Ok(mut rates) = self.rates.lock() {
            *rates = None;
        }
    }
}

#[async_trait]
impl RateSource for StubRateSource {
    async fn fetch_base_rates(&self) -> Result<BTreeMap<String, f64>, RateFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rates = self.rates.lock().map(|r| r.clone()).unwrap_or(None);
        rates.ok_or(RateFetchError::Timeout)
    }
}

pub(crate) struct Harness {
    pub db: Arc<InMemoryDatabase>,
    pub fast: Arc<dyn FastStore>,
    pub articles: Arc<CountingArticles>,
    pub likes: Arc<GatedLikes>,
    pub rates: Arc<GatedRates>,
    pub queue: Arc<InMemoryJobQueue>,
    pub source: Arc<StubRateSource>,
    pub services: Services,
    _shutdown: watch::Sender<bool>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(Arc::new(InMemoryFastStore::new()), InvalidationMode::Sync)
    }

    pub fn with_mode(mode: InvalidationMode) -> Self {
        Self::build(Arc::new(InMemoryFastStore::new()), mode)
    }

    pub fn with_fast_store(fast: Arc<dyn FastStore>) -> Self {
        Self::build(fast, InvalidationMode::Sync)
    }

    fn build(fast: Arc<dyn FastStore>, mode: InvalidationMode) -> Self {
        let db = Arc::new(InMemoryDatabase::new());
        let articles = Arc::new(CountingArticles::new(db.clone()));
        let likes = Arc::new(GatedLikes {
            inner: db.clone(),
            gate: ReadGate::default(),
        });
        let rates = Arc::new(GatedRates {
            inner: db.clone(),
            gate: ReadGate::default(),
        });
        let queue = Arc::new(InMemoryJobQueue::new(InMemoryJobQueueConfig {
            workers: 2,
            retry_backoff: Duration::from_millis(1),
            ..Default::default()
        }));
        let source = Arc::new(StubRateSource::serving(&[
            ("USD", 1.0),
            ("EUR", 0.9),
            ("JPY", 150.0),
            ("GBP", 0.8),
        ]));

        let stores = Stores {
            articles: articles.clone(),
            comments: db.clone(),
            likes: likes.clone(),
            favorites: db.clone(),
            categories: db.clone(),
            rates: rates.clone(),
            users: db.clone(),
            fast: fast.clone(),
            queue: queue.clone(),
        };
        let policy = CachePolicy {
            invalidation: mode,
            scan_batch: 3,
            ..Default::default()
        };
        let services = Services::new(stores, policy, RateConfig::default(), source.clone());

        let (shutdown, rx) = watch::channel(false);
        queue.start_workers(services.jobs.handler(), rx);

        Self {
            db,
            fast,
            articles,
            likes,
            rates,
            queue,
            source,
            services,
            _shutdown: shutdown,
        }
    }

    pub async fn user(&self, username: &str, role: Role) -> Actor {
        let user = UserRepository::create(
            self.db.as_ref(),
            NewUser {
                username: username.to_string(),
                password_hash: "unused".to_string(),
                role,
                nickname: None,
            },
        )
        .await
        .unwrap();
        Actor {
            user_id: user.id,
            role,
        }
    }

    pub async fn admin(&self) -> Actor {
        self.user("admin", Role::Admin).await
    }

    pub async fn article(&self, admin: &Actor, title: &str, category_id: Option<i64>) -> Article {
        self.services
            .articles
            .create(admin, draft(title, category_id))
            .await
            .unwrap()
    }

    /// Wait until the job queue has drained.
    pub async fn settle(&self) {
        for _ in 0..200 {
            let stats = self.queue.stats().await.unwrap();
            if stats.pending == 0 && stats.processing == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub async fn cached(&self, key: &str) -> bool {
        self.fast.exists(key).await.unwrap()
    }
}

pub(crate) fn draft(title: &str, category_id: Option<i64>) -> ArticleDraft {
    ArticleDraft {
        title: title.to_string(),
        content: format!("{title} body"),
        preview: format!("{title} preview"),
        cover: None,
        category_id,
        status: ArticleStatus::Published,
    }
}
