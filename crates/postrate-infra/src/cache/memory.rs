//! In-memory fast store - used as fallback when Redis is unavailable.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use postrate_core::ports::{CacheError, FastStore, SetOp};

enum Value {
    Str(String),
    Set(HashSet<String>),
    Hash(HashMap<String, String>),
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
    /// Insertion order; scan cursors walk this.
    seq: u64,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|exp| now >= exp).unwrap_or(false)
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    /// seq -> key, for cursor scans that stay valid across deletions.
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl Inner {
    /// Live entry for `key`, dropping it first if it has expired.
    fn live(&mut self, key: &str) -> Option<&mut Entry> {
        let now = Instant::now();
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            self.remove(key);
        }
        self.entries.get_mut(key)
    }

    fn insert(&mut self, key: &str, value: Value, ttl: Option<Duration>) {
        self.remove(key);
        self.next_seq += 1;
        let seq = self.next_seq;
        self.order.insert(seq, key.to_string());
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: ttl.map(|d| Instant::now() + d),
                seq,
            },
        );
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.order.remove(&entry.seq);
                true
            }
            None => false,
        }
    }
}

/// In-memory fast store using HashMaps behind an async RwLock.
///
/// Implements the same atomic "only if present" semantics as the Redis store;
/// each operation runs under one write lock. Data is lost on restart.
#[derive(Default)]
pub struct InMemoryFastStore {
    inner: RwLock<Inner>,
}

impl InMemoryFastStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn wrong_type(key: &str) -> CacheError {
    CacheError::Operation(format!("WRONGTYPE operation against key '{key}'"))
}

#[async_trait]
impl FastStore for InMemoryFastStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        {
            let inner = self.inner.read().await;
            match inner.entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(Instant::now()) => {
                    return match &entry.value {
                        Value::Str(s) => Ok(Some(s.clone())),
                        _ => Err(wrong_type(key)),
                    };
                }
                Some(_) => {}
            }
        }
        // Expired: clean up with the write lock.
        self.inner.write().await.live(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut inner = self.inner.write().await;
        inner.insert(key, Value::Str(value.to_string()), ttl);
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError> {
        let mut inner = self.inner.write().await;
        let mut removed = 0;
        for key in keys {
            if inner.live(key).is_some() && inner.remove(key) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.inner.write().await.live(key).is_some())
    }

    async fn incr_if_present(
        &self,
        key: &str,
        delta: i64,
        ttl: Duration,
    ) -> Result<Option<i64>, CacheError> {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.live(key) else {
            return Ok(None);
        };
        let Value::Str(raw) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        let current: i64 = raw
            .parse()
            .map_err(|_| CacheError::Operation(format!("value at '{key}' is not an integer")))?;
        let next = current + delta;
        *raw = next.to_string();
        entry.expires_at = Some(Instant::now() + ttl);
        Ok(Some(next))
    }

    async fn set_update_if_present(
        &self,
        key: &str,
        member: &str,
        op: SetOp,
        ttl: Duration,
    ) -> Result<Option<u64>, CacheError> {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.live(key) else {
            return Ok(None);
        };
        let Value::Set(members) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        match op {
            SetOp::Add => {
                members.insert(member.to_string());
            }
            SetOp::Remove => {
                members.remove(member);
            }
        }
        let size = members.len() as u64;
        if size == 0 {
            // An empty set does not exist.
            inner.remove(key);
        } else {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(Some(size))
    }

    async fn set_membership(&self, key: &str, member: &str) -> Result<Option<bool>, CacheError> {
        let mut inner = self.inner.write().await;
        match inner.live(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => Ok(Some(members.contains(member))),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set_replace(
        &self,
        key: &str,
        members: &[String],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut inner = self.inner.write().await;
        if members.is_empty() {
            inner.remove(key);
        } else {
            let set = members.iter().cloned().collect();
            inner.insert(key, Value::Set(set), Some(ttl));
        }
        Ok(())
    }

    async fn hash_replace(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut inner = self.inner.write().await;
        if fields.is_empty() {
            inner.remove(key);
        } else {
            let hash = fields.iter().cloned().collect();
            inner.insert(key, Value::Hash(hash), Some(ttl));
        }
        Ok(())
    }

    async fn hash_insert_if_absent(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let mut inner = self.inner.write().await;
        if fields.is_empty() || inner.live(key).is_some() {
            return Ok(false);
        }
        let hash = fields.iter().cloned().collect();
        inner.insert(key, Value::Hash(hash), Some(ttl));
        Ok(true)
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, CacheError> {
        let mut inner = self.inner.write().await;
        match inner.live(key) {
            None => Ok(HashMap::new()),
            Some(Entry {
                value: Value::Hash(fields),
                ..
            }) => Ok(fields.clone()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), CacheError> {
        let inner = self.inner.read().await;
        let now = Instant::now();
        let mut matched = Vec::new();
        let mut visited = 0;
        let mut last_seq = cursor;

        for (&seq, key) in inner.order.range(cursor.saturating_add(1)..) {
            if visited == count.max(1) {
                return Ok((last_seq, matched));
            }
            visited += 1;
            last_seq = seq;
            let live = inner.entries.get(key).is_some_and(|e| !e.is_expired(now));
            if live && glob_match(pattern, key) {
                matched.push(key.clone());
            }
        }
        Ok((0, matched))
    }
}

/// Redis-style glob supporting `*` and `?`.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_set_and_get() {
        let store = InMemoryFastStore::new();
        store.set("key1", "value1", None).await.unwrap();
        assert_eq!(store.get("key1").await.unwrap(), Some("value1".to_string()));
    }

    #[tokio::test]
    async fn test_delete_counts_existing_keys() {
        let store = InMemoryFastStore::new();
        store.set("key1", "value1", None).await.unwrap();
        let removed = store
            .delete(&["key1".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.get("key1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entries_are_absent() {
        let store = InMemoryFastStore::new();
        store
            .set("short", "v", Some(Duration::from_millis(20)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.get("short").await.unwrap(), None);
        assert!(!store.exists("short").await.unwrap());
    }

    #[tokio::test]
    async fn test_incr_only_when_present() {
        let store = InMemoryFastStore::new();
        assert_eq!(store.incr_if_present("c", 1, TTL).await.unwrap(), None);
        assert!(!store.exists("c").await.unwrap());

        store.set("c", "4", None).await.unwrap();
        assert_eq!(store.incr_if_present("c", -1, TTL).await.unwrap(), Some(3));
        assert_eq!(store.get("c").await.unwrap(), Some("3".to_string()));
    }

    #[tokio::test]
    async fn test_set_updates_only_when_present() {
        let store = InMemoryFastStore::new();
        assert_eq!(store.set_update_if_present("s", "1", SetOp::Add, TTL).await.unwrap(), None);
        assert_eq!(store.set_membership("s", "1").await.unwrap(), None);

        store.set_replace("s", &["1".into(), "2".into()], TTL).await.unwrap();
        assert_eq!(
            store.set_update_if_present("s", "3", SetOp::Add, TTL).await.unwrap(),
            Some(3)
        );
        assert_eq!(store.set_membership("s", "3").await.unwrap(), Some(true));
        assert_eq!(store.set_membership("s", "9").await.unwrap(), Some(false));

        store.set_replace("t", &["1".into()], TTL).await.unwrap();
        assert_eq!(
            store.set_update_if_present("t", "1", SetOp::Remove, TTL).await.unwrap(),
            Some(0)
        );
        assert!(!store.exists("t").await.unwrap());
    }

    #[tokio::test]
    async fn test_hash_insert_only_when_absent() {
        let store = InMemoryFastStore::new();
        assert!(store.hash_insert_if_absent("h", &[("a".into(), "1".into())], TTL).await.unwrap());
        assert!(!store.hash_insert_if_absent("h", &[("b".into(), "2".into())], TTL).await.unwrap());

        let all = store.hash_get_all("h").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all["a"], "1");
    }

    #[tokio::test]
    async fn test_hash_replace_drops_old_fields() {
        let store = InMemoryFastStore::new();
        store
            .hash_replace("h", &[("a".into(), "1".into()), ("b".into(), "2".into())], TTL)
            .await
            .unwrap();
        store.hash_replace("h", &[("c".into(), "3".into())], TTL).await.unwrap();
        let all = store.hash_get_all("h").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all["c"], "3");
    }

    #[tokio::test]
    async fn test_scan_survives_deletes_between_batches() {
        let store = InMemoryFastStore::new();
        for i in 0..25 {
            store.set(&format!("articles:list:all:page_{i}:limit_10"), "x", None).await.unwrap();
            store.set(&format!("other:{i}"), "y", None).await.unwrap();
        }

        let mut cursor = 0;
        let mut seen = 0;
        loop {
            let (next, batch) = store.scan(cursor, "articles:list:*", 7).await.unwrap();
            seen += batch.len();
            store.delete(&batch).await.unwrap();
            if next == 0 {
                break;
            }
            cursor = next;
        }
        assert_eq!(seen, 25);
        assert!(!store.exists("articles:list:all:page_3:limit_10").await.unwrap());
        assert!(store.exists("other:3").await.unwrap());
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("articles:list:*", "articles:list:all:page_1:limit_10"));
        assert!(glob_match("comments:article:1:*", "comments:article:1:page_1:limit_10"));
        assert!(!glob_match("comments:article:1:*", "comments:article:10:page_1:limit_10"));
        assert!(glob_match("a?c", "abc"));
        assert!(!glob_match("a?c", "abbc"));
    }
}
