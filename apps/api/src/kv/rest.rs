use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{ttl_secs, KvError, KvStore};

/// Redis-compatible REST backend (Upstash wire format): each command is POSTed
/// as a JSON array and answered with `{"result": ...}` or `{"error": "..."}`.
#[derive(Clone)]
pub struct RestKv {
    http: Client,
    url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct RestReply {
    #[serde(default)]
    result: Value,
    error: Option<String>,
}

impl RestKv {
    pub fn new(http: Client, url: String, token: String) -> Self {
        Self {
            http,
            url: url.trim_end_matches('/').to_string(),
            token,
        }
    }

    async fn command(&self, args: &[String]) -> Result<Value, KvError> {
        debug!("KV REST command: {}", args.first().map(String::as_str).unwrap_or(""));

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(args)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        // error replies may come with 4xx status but still carry the JSON body
        let reply: RestReply = serde_json::from_str(&body).map_err(|_| {
            if status.is_success() {
                KvError::UnexpectedReply(body.clone())
            } else {
                KvError::Rest(format!("status {status}: {body}"))
            }
        })?;

        if let Some(message) = reply.error {
            return Err(KvError::Rest(message));
        }
        if !status.is_success() {
            return Err(KvError::Rest(format!("status {status}")));
        }
        Ok(reply.result)
    }

    /// Runs `commands` as one MULTI/EXEC transaction.
    async fn transaction(&self, commands: &[Vec<String>]) -> Result<Vec<Value>, KvError> {
        debug!("KV REST transaction of {} command(s)", commands.len());

        let response = self
            .http
            .post(format!("{}/multi-exec", self.url))
            .bearer_auth(&self.token)
            .json(commands)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<RestReply>(&body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or(body);
            return Err(KvError::Rest(format!("status {status}: {message}")));
        }

        let replies: Vec<RestReply> =
            serde_json::from_str(&body).map_err(|_| KvError::UnexpectedReply(body.clone()))?;
        replies
            .into_iter()
            .map(|reply| match reply.error {
                Some(message) => Err(KvError::Rest(message)),
                None => Ok(reply.result),
            })
            .collect()
    }
}

fn args<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn as_integer(value: &Value) -> Result<i64, KvError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| KvError::UnexpectedReply(n.to_string())),
        Value::String(s) => s
            .parse()
            .map_err(|_| KvError::UnexpectedReply(s.clone())),
        other => Err(KvError::UnexpectedReply(other.to_string())),
    }
}

#[async_trait]
impl KvStore for RestKv {
    fn backend(&self) -> &'static str {
        "rest"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        match self.command(&args(["GET", key])).await? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Ok(Some(other.to_string())),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError> {
        let mut cmd = args(["SET", key, value]);
        if let Some(ttl) = ttl {
            cmd.push("EX".into());
            cmd.push(ttl_secs(ttl).to_string());
        }
        self.command(&cmd).await?;
        Ok(())
    }

    async fn set_nx(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, KvError> {
        let mut cmd = args(["SET", key, value, "NX"]);
        if let Some(ttl) = ttl {
            cmd.push("EX".into());
            cmd.push(ttl_secs(ttl).to_string());
        }
        Ok(!self.command(&cmd).await?.is_null())
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, KvError> {
        let replies = self
            .transaction(&[args(["INCR", key]), args(["TTL", key])])
            .await?;
        let [count, remaining] = replies.as_slice() else {
            return Err(KvError::UnexpectedReply(format!("{replies:?}")));
        };
        let count = as_integer(count)?;
        // TTL is -1 for a fresh counter and for one whose EXPIRE was lost
        if as_integer(remaining)? < 0 {
            let secs = ttl_secs(ttl).to_string();
            self.command(&args(["EXPIRE", key, &secs])).await?;
        }
        Ok(count)
    }

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        Ok(as_integer(&self.command(&args(["EXISTS", key])).await?)? > 0)
    }

    async fn del(&self, key: &str) -> Result<(), KvError> {
        self.command(&args(["DEL", key])).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> RestKv {
        RestKv::new(Client::new(), format!("{}/", server.uri()), "secret".into())
    }

    #[tokio::test]
    async fn test_get_sends_bearer_token_and_command() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(json!(["GET", "greeting"])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "hello"})))
            .expect(1)
            .mount(&server)
            .await;

        let value = store(&server).get("greeting").await.unwrap();
        assert_eq!(value.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_get_missing_key_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": null})))
            .mount(&server)
            .await;

        assert_eq!(store(&server).get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_nx_reports_existing_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!(["SET", "idem", "1", "NX", "EX", "60"])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": null})))
            .mount(&server)
            .await;

        let written = store(&server)
            .set_nx("idem", "1", Some(Duration::from_secs(60)))
            .await
            .unwrap();
        assert!(!written);
    }

    async fn mount_incr_reply(server: &MockServer, count: i64, ttl: i64, times: u64) {
        Mock::given(method("POST"))
            .and(path("/multi-exec"))
            .and(body_json(json!([["INCR", "hits"], ["TTL", "hits"]])))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{"result": count}, {"result": ttl}])),
            )
            .up_to_n_times(times)
            .expect(times)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_incr_sets_expiry_on_first_hit() {
        let server = MockServer::start().await;
        mount_incr_reply(&server, 1, -1, 1).await;
        Mock::given(method("POST"))
            .and(body_json(json!(["EXPIRE", "hits", "600"])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let count = store(&server)
            .incr("hits", Duration::from_secs(600))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_incr_keeps_running_window() {
        let server = MockServer::start().await;
        mount_incr_reply(&server, 3, 412, 1).await;
        Mock::given(method("POST"))
            .and(body_json(json!(["EXPIRE", "hits", "600"])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": 1})))
            .expect(0)
            .mount(&server)
            .await;

        let count = store(&server)
            .incr("hits", Duration::from_secs(600))
            .await
            .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_lost_expire_is_reapplied_on_next_hit() {
        let server = MockServer::start().await;
        mount_incr_reply(&server, 1, -1, 1).await;
        mount_incr_reply(&server, 2, -1, 1).await;
        Mock::given(method("POST"))
            .and(body_json(json!(["EXPIRE", "hits", "600"])))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "timeout"})))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_json(json!(["EXPIRE", "hits", "600"])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let kv = store(&server);
        let window = Duration::from_secs(600);
        assert!(kv.incr("hits", window).await.is_err());
        assert_eq!(kv.incr("hits", window).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_error_reply_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"error": "ERR value is not an integer"})),
            )
            .mount(&server)
            .await;

        let err = store(&server)
            .incr("name", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, KvError::Rest(msg) if msg.contains("not an integer")));
    }
}
