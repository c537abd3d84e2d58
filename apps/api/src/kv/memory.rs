use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{KvError, KvStore};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Per-process store. Counters and idempotency keys are not shared between
/// instances, so this is only suitable for development and single-node setups.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the map and drops expired entries.
    fn live_entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        entries.retain(|_, entry| entry.is_live(now));
        entries
    }
}

fn expiry(ttl: Option<Duration>) -> Option<Instant> {
    ttl.map(|ttl| Instant::now() + ttl)
}

#[async_trait]
impl KvStore for MemoryKv {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        Ok(self.live_entries().get(key).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError> {
        self.live_entries().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: expiry(ttl),
            },
        );
        Ok(())
    }

    async fn set_nx(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, KvError> {
        let mut entries = self.live_entries();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: expiry(ttl),
            },
        );
        Ok(true)
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, KvError> {
        let mut entries = self.live_entries();
        match entries.get_mut(key) {
            Some(entry) => {
                let current: i64 = entry.value.parse().map_err(|_| {
                    KvError::UnexpectedReply(format!("value at '{key}' is not an integer"))
                })?;
                let next = current + 1;
                entry.value = next.to_string();
                if entry.expires_at.is_none() {
                    entry.expires_at = expiry(Some(ttl));
                }
                Ok(next)
            }
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: "1".to_string(),
                        expires_at: expiry(Some(ttl)),
                    },
                );
                Ok(1)
            }
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        Ok(self.live_entries().contains_key(key))
    }

    async fn del(&self, key: &str) -> Result<(), KvError> {
        self.live_entries().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let kv = MemoryKv::new();
        kv.set("session", "abc", Some(Duration::from_secs(30)))
            .await
            .unwrap();
        assert_eq!(kv.get("session").await.unwrap().as_deref(), Some("abc"));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(kv.get("session").await.unwrap(), None);
        assert!(!kv.exists("session").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_without_ttl_clears_expiry() {
        let kv = MemoryKv::new();
        kv.set("k", "v1", Some(Duration::from_secs(5))).await.unwrap();
        kv.set("k", "v2", None).await.unwrap();

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_set_nx_only_writes_once() {
        let kv = MemoryKv::new();
        assert!(kv.set_nx("idem", "first", None).await.unwrap());
        assert!(!kv.set_nx("idem", "second", None).await.unwrap());
        assert_eq!(kv.get("idem").await.unwrap().as_deref(), Some("first"));

        kv.del("idem").await.unwrap();
        assert!(kv.set_nx("idem", "third", None).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_incr_window_resets_after_ttl() {
        let kv = MemoryKv::new();
        let window = Duration::from_secs(60);
        assert_eq!(kv.incr("hits", window).await.unwrap(), 1);
        assert_eq!(kv.incr("hits", window).await.unwrap(), 2);

        // later increments keep the original expiry
        tokio::time::advance(Duration::from_secs(45)).await;
        assert_eq!(kv.incr("hits", window).await.unwrap(), 3);

        tokio::time::advance(Duration::from_secs(16)).await;
        assert_eq!(kv.incr("hits", window).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_incr_gives_persistent_counter_an_expiry() {
        let kv = MemoryKv::new();
        kv.set("hits", "4", None).await.unwrap();
        assert_eq!(kv.incr("hits", Duration::from_secs(60)).await.unwrap(), 5);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!kv.exists("hits").await.unwrap());
    }

    #[tokio::test]
    async fn test_incr_rejects_non_integer() {
        let kv = MemoryKv::new();
        kv.set("name", "ride", None).await.unwrap();
        assert!(matches!(
            kv.incr("name", Duration::from_secs(1)).await,
            Err(KvError::UnexpectedReply(_))
        ));
    }
}
