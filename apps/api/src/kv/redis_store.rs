use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Client as RedisClient;
use tokio::sync::OnceCell;
use tracing::info;

use super::{ttl_secs, KvError, KvStore};

/// Redis backend. The multiplexed connection is opened on first use and
/// shared by all requests.
pub struct RedisKv {
    client: RedisClient,
    conn: OnceCell<MultiplexedConnection>,
}

impl RedisKv {
    pub fn open(url: &str) -> Result<Self, KvError> {
        Ok(Self {
            client: RedisClient::open(url)?,
            conn: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, KvError> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                let conn = self.client.get_multiplexed_async_connection().await?;
                info!("Redis connection established");
                Ok::<_, KvError>(conn)
            })
            .await?;
        Ok(conn.clone())
    }
}

#[async_trait]
impl KvStore for RedisKv {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError> {
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl_secs(ttl));
        }
        cmd.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn set_nx(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, KvError> {
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl_secs(ttl));
        }
        // "OK" when written, nil when the key already existed
        let reply: Option<String> = cmd.query_async(&mut conn).await?;
        Ok(reply.is_some())
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, KvError> {
        let mut conn = self.connection().await?;
        let (count, remaining): (i64, i64) = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(key)
            .cmd("TTL")
            .arg(key)
            .query_async(&mut conn)
            .await?;
        // TTL is -1 for a fresh counter and for one whose EXPIRE was lost
        if remaining < 0 {
            redis::cmd("EXPIRE")
                .arg(key)
                .arg(ttl_secs(ttl))
                .query_async::<_, ()>(&mut conn)
                .await?;
        }
        Ok(count)
    }

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        let mut conn = self.connection().await?;
        let count: i64 = redis::cmd("EXISTS").arg(key).query_async(&mut conn).await?;
        Ok(count > 0)
    }

    async fn del(&self, key: &str) -> Result<(), KvError> {
        let mut conn = self.connection().await?;
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_rejects_invalid_url() {
        assert!(RedisKv::open("not a redis url").is_err());
    }

    #[test]
    fn test_open_does_not_connect() {
        // nothing listens on this port; opening must still succeed
        let kv = RedisKv::open("redis://127.0.0.1:1").unwrap();
        assert_eq!(kv.backend(), "redis");
    }
}
