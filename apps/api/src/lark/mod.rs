//! Lark custom-bot webhook delivery.
//!
//! A webhook answers HTTP 200 even for rejected messages; the outcome is in the
//! JSON body, either `{"code", "msg"}` or the legacy `{"StatusCode", "StatusMessage"}`.

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};

pub mod card;

pub use card::{CardBuilder, HeaderColor, LarkMessage};

#[derive(Debug, Error)]
pub enum LarkError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Lark API error: status {status}, body {body}")]
    Status { status: u16, body: String },

    #[error("Lark rejected message: code {code}, {msg}")]
    Rejected { code: i64, msg: String },
}

#[derive(Debug, Deserialize)]
struct LarkReply {
    code: Option<i64>,
    msg: Option<String>,
    #[serde(rename = "StatusCode")]
    status_code: Option<i64>,
    #[serde(rename = "StatusMessage")]
    status_message: Option<String>,
}

#[derive(Clone)]
pub struct LarkClient {
    http: Client,
}

impl LarkClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    /// POSTs `message` to `url` once and interprets the reply.
    pub async fn send(&self, url: &str, message: &LarkMessage) -> Result<(), LarkError> {
        let target = redact(url);

        let response = self.http.post(url).json(message).send().await.map_err(|e| {
            error!("Failed to reach Lark webhook {target}: {e}");
            LarkError::Http(e)
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read response body".to_string());

        if !status.is_success() {
            error!("Lark API error for {target}: status {status}, body {body}");
            return Err(LarkError::Status {
                status: status.as_u16(),
                body,
            });
        }

        check_reply(&body)?;
        info!("Delivered Lark notification to {target}");
        Ok(())
    }
}

/// Best-effort interpretation of a 2xx reply body.
fn check_reply(body: &str) -> Result<(), LarkError> {
    let reply = match serde_json::from_str::<LarkReply>(body) {
        Ok(reply) => reply,
        Err(_) => {
            debug!("Unparseable Lark reply treated as success: {body}");
            return Ok(());
        }
    };

    let (code, msg) = match (reply.code, reply.status_code) {
        (Some(code), _) => (code, reply.msg),
        (None, Some(code)) => (code, reply.status_message),
        (None, None) => return Ok(()),
    };

    if code == 0 {
        Ok(())
    } else {
        Err(LarkError::Rejected {
            code,
            msg: msg.unwrap_or_default(),
        })
    }
}

/// Webhook URLs embed their secret in the path; only the host is logged.
pub fn redact(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(parsed) => format!(
            "{}://{}/…",
            parsed.scheme(),
            parsed.host_str().unwrap_or("unknown")
        ),
        Err(_) => "<invalid url>".to_string(),
    }
}
