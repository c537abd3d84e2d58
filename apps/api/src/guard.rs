//! Submission guard: per-client fixed-window rate limiting and optional
//! idempotency keys, both stored in the configured KV backend.
//!
//! KV failures fail open: the request proceeds and the error is logged.

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use tracing::warn;

use crate::config::GuardSettings;
use crate::errors::AppError;
use crate::kv::KvStore;

pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";
const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;
/// Value held by a claimed key until the submission has been relayed.
const PENDING: &str = "pending";

/// Outcome of claiming an idempotency key.
#[derive(Debug, Clone, PartialEq)]
pub enum Claim {
    /// First time this submission is seen; holds the KV key to complete or release.
    Fresh(Option<String>),
    /// The key was already used; the submission must not be relayed again.
    /// Holds the id of the earlier submission once it has been relayed.
    Duplicate(Option<String>),
}

#[derive(Clone)]
pub struct SubmissionGuard {
    kv: Arc<dyn KvStore>,
    settings: GuardSettings,
}

impl SubmissionGuard {
    pub fn new(kv: Arc<dyn KvStore>, settings: GuardSettings) -> Self {
        Self { kv, settings }
    }

    /// Counts this submission against the client's window. A limit of 0
    /// disables rate limiting.
    pub async fn check_rate(&self, scope: &str, client: &str) -> Result<(), AppError> {
        if self.settings.rate_limit == 0 {
            return Ok(());
        }
        let key = format!("ratelimit:{scope}:{client}");
        let window = Duration::from_secs(self.settings.rate_window_secs);

        match self.kv.incr(&key, window).await {
            Ok(count) if count > i64::from(self.settings.rate_limit) => {
                warn!("Rate limit exceeded for {scope} by {client} ({count} in window)");
                Err(AppError::RateLimited {
                    retry_after_secs: self.settings.rate_window_secs,
                })
            }
            Ok(_) => Ok(()),
            Err(e) => {
                warn!("Rate limit check skipped, KV unavailable: {e}");
                Ok(())
            }
        }
    }

    pub async fn claim(&self, scope: &str, key: Option<&str>) -> Claim {
        let Some(key) = key else {
            return Claim::Fresh(None);
        };
        let kv_key = format!("idempotency:{scope}:{key}");

        match self.kv.set_nx(&kv_key, PENDING, Some(self.idempotency_ttl())).await {
            Ok(true) => Claim::Fresh(Some(kv_key)),
            Ok(false) => {
                let original = match self.kv.get(&kv_key).await {
                    Ok(value) => value.filter(|v| v != PENDING),
                    Err(e) => {
                        warn!("Could not read idempotency key {kv_key}: {e}");
                        None
                    }
                };
                Claim::Duplicate(original)
            }
            Err(e) => {
                warn!("Idempotency check skipped, KV unavailable: {e}");
                Claim::Fresh(None)
            }
        }
    }

    /// Records the id of a relayed submission under its claimed key, so that
    /// retries can be answered with it.
    pub async fn complete(&self, claim: &Claim, id: &str) {
        if let Claim::Fresh(Some(kv_key)) = claim {
            if let Err(e) = self.kv.set(kv_key, id, Some(self.idempotency_ttl())).await {
                warn!("Failed to complete idempotency key {kv_key}: {e}");
            }
        }
    }

    /// Forgets a claimed key so that the client may retry.
    pub async fn release(&self, claim: &Claim) {
        if let Claim::Fresh(Some(kv_key)) = claim {
            if let Err(e) = self.kv.del(kv_key).await {
                warn!("Failed to release idempotency key {kv_key}: {e}");
            }
        }
    }

    fn idempotency_ttl(&self) -> Duration {
        Duration::from_secs(self.settings.idempotency_ttl_secs)
    }
}

/// Identifies the client behind the proxy: first `X-Forwarded-For` hop, then
/// `X-Real-IP`, else `unknown`.
pub fn client_key(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .unwrap_or("unknown")
        .to_string()
}

/// Reads the `Idempotency-Key` header: at most 128 printable ASCII characters.
pub fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>, AppError> {
    let Some(value) = headers.get(IDEMPOTENCY_HEADER) else {
        return Ok(None);
    };
    let key = value
        .to_str()
        .map(str::trim)
        .map_err(|_| AppError::Validation("Idempotency-Key must be ASCII".to_string()))?;

    if key.is_empty() {
        return Ok(None);
    }
    if key.len() > MAX_IDEMPOTENCY_KEY_LEN || !key.chars().all(|c| matches!(c, ' '..='~')) {
        return Err(AppError::Validation(format!(
            "Idempotency-Key must be 1-{MAX_IDEMPOTENCY_KEY_LEN} printable ASCII characters"
        )));
    }
    Ok(Some(key.to_string()))
}
