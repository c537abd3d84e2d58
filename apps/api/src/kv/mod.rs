//! Key-value store used by the submission guard.
//!
//! Three interchangeable backends sit behind [`KvStore`]: a Redis server, a
//! Redis-compatible REST service (Upstash / Vercel KV), or a per-process map.
//! [`build_store`] picks one from configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::KvSettings;

pub mod memory;
pub mod redis_store;
pub mod rest;

pub use memory::MemoryKv;
pub use redis_store::RedisKv;
pub use rest::RestKv;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("REST KV error: {0}")]
    Rest(String),

    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),
}

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Short backend name, reported by `/health`.
    fn backend(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Stores `value`. `ttl = None` removes any previous expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError>;

    /// Stores `value` only if `key` is absent. Returns `true` when written.
    async fn set_nx(&self, key: &str, value: &str, ttl: Option<Duration>)
        -> Result<bool, KvError>;

    /// Increments a counter, applying `ttl` when the counter is created or
    /// has no expiry left (e.g. a previous `EXPIRE` never landed).
    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, KvError>;

    async fn exists(&self, key: &str) -> Result<bool, KvError>;

    async fn del(&self, key: &str) -> Result<(), KvError>;
}

/// Selects the KV backend: Redis, then REST, then in-memory.
pub fn build_store(settings: &KvSettings, http: reqwest::Client) -> Result<Arc<dyn KvStore>> {
    if let Some(url) = &settings.redis_url {
        let store = RedisKv::open(url)?;
        info!("KV backend: redis");
        return Ok(Arc::new(store));
    }

    match (&settings.rest_url, &settings.rest_token) {
        (Some(url), Some(token)) => {
            info!("KV backend: rest");
            Ok(Arc::new(RestKv::new(http, url.clone(), token.clone())))
        }
        (Some(_), None) | (None, Some(_)) => {
            warn!("KV REST URL and token must both be set; falling back to in-memory store");
            Ok(Arc::new(MemoryKv::new()))
        }
        (None, None) => {
            warn!("No KV backend configured; using in-memory store (not shared between instances)");
            Ok(Arc::new(MemoryKv::new()))
        }
    }
}

/// TTL in whole seconds, never below one.
pub(crate) fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_store_defaults_to_memory() {
        let store = build_store(&KvSettings::default(), reqwest::Client::new()).unwrap();
        assert_eq!(store.backend(), "memory");
    }

    #[test]
    fn test_build_store_requires_both_rest_settings() {
        let settings = KvSettings {
            rest_url: Some("https://kv.example".into()),
            ..Default::default()
        };
        let store = build_store(&settings, reqwest::Client::new()).unwrap();
        assert_eq!(store.backend(), "memory");
    }

    #[test]
    fn test_build_store_prefers_redis() {
        let settings = KvSettings {
            redis_url: Some("redis://127.0.0.1:6379".into()),
            rest_url: Some("https://kv.example".into()),
            rest_token: Some("token".into()),
        };
        let store = build_store(&settings, reqwest::Client::new()).unwrap();
        assert_eq!(store.backend(), "redis");
    }

    #[test]
    fn test_ttl_secs_rounds_up_to_one() {
        assert_eq!(ttl_secs(Duration::from_millis(10)), 1);
        assert_eq!(ttl_secs(Duration::from_secs(90)), 90);
    }
}
