//! Redis fast store with connection manager and atomic compound operations.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError, Script};

use postrate_core::ports::{CacheError, FastStore, SetOp};

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., redis://localhost:6379)
    pub url: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Whether to fall back to the in-memory store if Redis is unavailable
    pub fallback_to_memory: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
            fallback_to_memory: true,
        }
    }
}

impl RedisConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            connect_timeout: Duration::from_secs(
                std::env::var("REDIS_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            fallback_to_memory: std::env::var("REDIS_FALLBACK_TO_MEMORY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
        }
    }
}

/// Redis-backed fast store.
///
/// Check-then-write operations run as Lua scripts and replacements as
/// MULTI/EXEC pipelines, so concurrent callers never observe half an update.
pub struct RedisFastStore {
    conn: ConnectionManager,
    incr_if_present: Script,
    set_update_if_present: Script,
    hash_insert_if_absent: Script,
}

impl RedisFastStore {
    pub async fn new(config: &RedisConfig) -> Result<Self, CacheError> {
        let client =
            Client::open(config.url.as_str()).map_err(|e| CacheError::Connection(e.to_string()))?;

        // Use timeout to prevent hanging if Redis is unreachable
        let conn_manager_fut = ConnectionManager::new(client);
        let conn = tokio::time::timeout(config.connect_timeout, conn_manager_fut)
            .await
            .map_err(|_| CacheError::Connection("Connection timed out".to_string()))?
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        // Returns the new value, or nil when the key is absent.
        let incr_if_present = Script::new(
            r#"
            if redis.call('EXISTS', KEYS[1]) == 0 then
                return false
            end
            local value = redis.call('INCRBY', KEYS[1], ARGV[1])
            redis.call('EXPIRE', KEYS[1], ARGV[2])
            return value
            "#,
        );

        // Returns the set size after the update, or -1 when the set is absent.
        let set_update_if_present = Script::new(
            r#"
            if redis.call('EXISTS', KEYS[1]) == 0 then
                return -1
            end
            if ARGV[1] == 'add' then
                redis.call('SADD', KEYS[1], ARGV[2])
            else
                redis.call('SREM', KEYS[1], ARGV[2])
            end
            local size = redis.call('SCARD', KEYS[1])
            if size > 0 then
                redis.call('EXPIRE', KEYS[1], ARGV[3])
            end
            return size
            "#,
        );

        // ARGV: ttl, then field/value pairs. Returns 1 when written.
        let hash_insert_if_absent = Script::new(
            r#"
            if redis.call('EXISTS', KEYS[1]) == 1 then
                return 0
            end
            for i = 2, #ARGV, 2 do
                redis.call('HSET', KEYS[1], ARGV[i], ARGV[i + 1])
            end
            redis.call('EXPIRE', KEYS[1], ARGV[1])
            return 1
            "#,
        );

        tracing::info!(url = %config.url, "Connected to Redis fast store");

        Ok(Self {
            conn,
            incr_if_present,
            set_update_if_present,
            hash_insert_if_absent,
        })
    }

    /// Create from environment configuration.
    pub async fn from_env() -> Result<Self, CacheError> {
        Self::new(&RedisConfig::from_env()).await
    }
}

fn op_err(e: RedisError) -> CacheError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_timeout() {
        CacheError::Connection(e.to_string())
    } else {
        CacheError::Operation(e.to_string())
    }
}

/// Redis expiry has one-second resolution; never send 0.
fn ttl_secs(ttl: Duration) -> i64 {
    ttl.as_secs().max(1) as i64
}

#[async_trait]
impl FastStore for RedisFastStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(key).await.map_err(op_err)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();

        match ttl {
            Some(duration) => {
                conn.set_ex::<_, _, ()>(key, value, ttl_secs(duration) as u64)
                    .await
                    .map_err(op_err)?;
            }
            None => {
                conn.set::<_, _, ()>(key, value).await.map_err(op_err)?;
            }
        }

        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        conn.del::<_, u64>(keys).await.map_err(op_err)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        conn.exists::<_, bool>(key).await.map_err(op_err)
    }

    async fn incr_if_present(
        &self,
        key: &str,
        delta: i64,
        ttl: Duration,
    ) -> Result<Option<i64>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<i64> = self
            .incr_if_present
            .key(key)
            .arg(delta)
            .arg(ttl_secs(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(op_err)?;
        Ok(value)
    }

    async fn set_update_if_present(
        &self,
        key: &str,
        member: &str,
        op: SetOp,
        ttl: Duration,
    ) -> Result<Option<u64>, CacheError> {
        let mut conn = self.conn.clone();
        let op = match op {
            SetOp::Add => "add",
            SetOp::Remove => "remove",
        };
        let size: i64 = self
            .set_update_if_present
            .key(key)
            .arg(op)
            .arg(member)
            .arg(ttl_secs(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(op_err)?;
        Ok(u64::try_from(size).ok())
    }

    async fn set_membership(&self, key: &str, member: &str) -> Result<Option<bool>, CacheError> {
        let mut conn = self.conn.clone();
        let (exists, is_member): (bool, bool) = redis::pipe()
            .atomic()
            .exists(key)
            .sismember(key, member)
            .query_async(&mut conn)
            .await
            .map_err(op_err)?;
        Ok(exists.then_some(is_member))
    }

    async fn set_replace(
        &self,
        key: &str,
        members: &[String],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic().del(key).ignore();
        if !members.is_empty() {
            pipe.sadd(key, members)
                .ignore()
                .expire(key, ttl_secs(ttl))
                .ignore();
        }
        let () = pipe.query_async(&mut conn).await.map_err(op_err)?;
        Ok(())
    }

    async fn hash_replace(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic().del(key).ignore();
        if !fields.is_empty() {
            pipe.hset_multiple(key, fields)
                .ignore()
                .expire(key, ttl_secs(ttl))
                .ignore();
        }
        let () = pipe.query_async(&mut conn).await.map_err(op_err)?;
        Ok(())
    }

    async fn hash_insert_if_absent(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        if fields.is_empty() {
            return Ok(false);
        }
        let mut conn = self.conn.clone();
        let mut invocation = self.hash_insert_if_absent.key(key);
        invocation.arg(ttl_secs(ttl));
        for (field, value) in fields {
            invocation.arg(field).arg(value);
        }
        let written: i64 = invocation.invoke_async(&mut conn).await.map_err(op_err)?;
        Ok(written == 1)
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, CacheError> {
        let mut conn = self.conn.clone();
        conn.hgetall::<_, HashMap<String, String>>(key)
            .await
            .map_err(op_err)
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), CacheError> {
        let mut conn = self.conn.clone();
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count.max(1))
            .query_async(&mut conn)
            .await
            .map_err(op_err)?;
        Ok((next, keys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn get_test_store() -> Option<RedisFastStore> {
        let config = RedisConfig {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6389".to_string()),
            connect_timeout: Duration::from_secs(1),
            fallback_to_memory: false,
        };

        RedisFastStore::new(&config).await.ok()
    }

    fn test_key(name: &str) -> String {
        format!("postrate-test:{}:{name}", uuid::Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_redis_set_get_delete() {
        let store = match get_test_store().await {
            Some(s) => s,
            None => {
                tracing::warn!("Redis not available, skipping test");
                return;
            }
        };

        let key = test_key("kv");
        store.set(&key, "value", None).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some("value".to_string()));

        assert_eq!(store.delete(&[key.clone()]).await.unwrap(), 1);
        assert_eq!(store.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_redis_only_if_present_scripts() {
        let store = match get_test_store().await {
            Some(s) => s,
            None => return,
        };
        let ttl = Duration::from_secs(30);

        let counter = test_key("count");
        assert_eq!(store.incr_if_present(&counter, 1, ttl).await.unwrap(), None);
        assert!(!store.exists(&counter).await.unwrap());
        store.set(&counter, "2", Some(ttl)).await.unwrap();
        assert_eq!(store.incr_if_present(&counter, 1, ttl).await.unwrap(), Some(3));

        let set = test_key("set");
        assert_eq!(store.set_update_if_present(&set, "7", SetOp::Add, ttl).await.unwrap(), None);
        assert_eq!(store.set_membership(&set, "7").await.unwrap(), None);
        store.set_replace(&set, &["1".to_string()], ttl).await.unwrap();
        assert_eq!(
            store.set_update_if_present(&set, "7", SetOp::Add, ttl).await.unwrap(),
            Some(2)
        );
        assert_eq!(store.set_membership(&set, "7").await.unwrap(), Some(true));

        let hash = test_key("snapshot");
        assert!(store.hash_insert_if_absent(&hash, &[("EUR".into(), "0.9".into())], ttl).await.unwrap());
        assert!(!store.hash_insert_if_absent(&hash, &[("EUR".into(), "0.1".into())], ttl).await.unwrap());
        assert_eq!(store.hash_get_all(&hash).await.unwrap()["EUR"], "0.9");

        store.delete(&[counter, set, hash]).await.unwrap();
    }

    #[tokio::test]
    async fn test_redis_hash_replace_and_scan() {
        let store = match get_test_store().await {
            Some(s) => s,
            None => return,
        };
        let ttl = Duration::from_secs(30);

        let hash = test_key("hash");
        store
            .hash_replace(&hash, &[("EUR".into(), "0.9".into()), ("JPY".into(), "150".into())], ttl)
            .await
            .unwrap();
        store.hash_replace(&hash, &[("GBP".into(), "0.8".into())], ttl).await.unwrap();
        let fields = store.hash_get_all(&hash).await.unwrap();
        assert_eq!(fields.len(), 1);

        let prefix = test_key("scan");
        let keys: Vec<String> = (0..5).map(|i| format!("{prefix}:{i}")).collect();
        for key in &keys {
            store.set(key, "x", Some(ttl)).await.unwrap();
        }
        let mut cursor = 0;
        let mut found = 0;
        loop {
            let (next, batch) = store.scan(cursor, &format!("{prefix}:*"), 2).await.unwrap();
            found += store.delete(&batch).await.unwrap();
            if next == 0 {
                break;
            }
            cursor = next;
        }
        assert_eq!(found, 5);
        store.delete(&[hash]).await.unwrap();
    }
}
