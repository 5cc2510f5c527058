use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

/// Which way a set update goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    Add,
    Remove,
}

/// Fast store trait - abstraction over the key-value backend (Redis, in-memory)
/// holding cache entries, counters and snapshots.
///
/// Every method reports backend trouble as `CacheError`; callers in the core
/// treat that as "entry absent" and fall back to the durable store.
#[async_trait]
pub trait FastStore: Send + Sync {
    /// Get a string value.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Set a string value with optional TTL.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Delete keys, returning how many existed.
    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError>;

    /// Check if a key exists.
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Atomically add `delta` to an integer key and refresh its TTL, only if
    /// the key is present. Returns the new value, or `None` when absent.
    async fn incr_if_present(
        &self,
        key: &str,
        delta: i64,
        ttl: Duration,
    ) -> Result<Option<i64>, CacheError>;

    /// Atomically add or remove a set member and refresh the TTL, only if the
    /// set is present. Returns the set size after the update, or `None` when
    /// the set was absent.
    async fn set_update_if_present(
        &self,
        key: &str,
        member: &str,
        op: SetOp,
        ttl: Duration,
    ) -> Result<Option<u64>, CacheError>;

    /// Membership of `member` in the set at `key`; `None` when the set is absent.
    async fn set_membership(&self, key: &str, member: &str) -> Result<Option<bool>, CacheError>;

    /// Replace the whole set in one atomic step. An empty member list leaves
    /// the key absent.
    async fn set_replace(
        &self,
        key: &str,
        members: &[String],
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Replace the whole hash in one atomic step.
    async fn hash_replace(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Write the hash only when `key` is absent, in one atomic step. Returns
    /// whether it was written.
    async fn hash_insert_if_absent(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> Result<bool, CacheError>;

    /// All fields of the hash at `key`; empty when absent.
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, CacheError>;

    /// One step of an incremental cursor scan. Start with cursor 0; the scan is
    /// complete when the returned cursor is 0 again.
    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), CacheError>;
}

/// Fast store operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}
