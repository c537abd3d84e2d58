use anyhow::{Context, Result};
use serde::Deserialize;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub cms: CmsSettings,
    pub webhooks: WebhookSettings,
    pub base: Option<BaseSettings>,
    pub kv: KvSettings,
    pub guard: GuardSettings,
    pub http_timeout_secs: u64,
    pub port: u16,
    pub rust_log: String,
}

#[derive(Debug, Clone)]
pub struct CmsSettings {
    pub base_url: String,
    pub api_key: String,
}

/// A `LARK_WEBHOOK_ROUTES` rule: notify `url` when `pattern` appears in the
/// company name or job title of an application.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebhookRoute {
    #[serde(rename = "match")]
    pub pattern: String,
    pub url: String,
}

#[derive(Debug, Clone, Default)]
pub struct WebhookSettings {
    pub default_url: Option<String>,
    pub application_url: Option<String>,
    pub contact_url: Option<String>,
    pub routes: Vec<WebhookRoute>,
    pub cc_urls: Vec<String>,
}

impl WebhookSettings {
    pub fn application_fallback(&self) -> Option<&str> {
        self.application_url
            .as_deref()
            .or(self.default_url.as_deref())
    }

    pub fn contact_fallback(&self) -> Option<&str> {
        self.contact_url.as_deref().or(self.default_url.as_deref())
    }
}

#[derive(Debug, Clone)]
pub struct BaseSettings {
    pub url: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct KvSettings {
    pub redis_url: Option<String>,
    pub rest_url: Option<String>,
    pub rest_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GuardSettings {
    pub rate_limit: u32,
    pub rate_window_secs: u64,
    pub idempotency_ttl_secs: u64,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            rate_limit: 5,
            rate_window_secs: 600,
            idempotency_ttl_secs: 86_400,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let domain = require_env("MICROCMS_SERVICE_DOMAIN")?;
        let cms = CmsSettings {
            base_url: optional_env("MICROCMS_BASE_URL")
                .unwrap_or_else(|| format!("https://{domain}.microcms.io/api/v1")),
            api_key: require_env("MICROCMS_API_KEY")?,
        };

        let routes = match optional_env("LARK_WEBHOOK_ROUTES") {
            Some(raw) => parse_routes(&raw)?,
            None => Vec::new(),
        };

        let webhooks = WebhookSettings {
            default_url: optional_env("LARK_WEBHOOK_URL"),
            application_url: optional_env("LARK_WEBHOOK_URL_APPLICATION"),
            contact_url: optional_env("LARK_WEBHOOK_URL_CONTACT"),
            routes,
            cc_urls: optional_env("LARK_WEBHOOK_CC_URLS")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
        };

        let base = optional_env("BASE_REGISTRATION_URL").map(|url| BaseSettings {
            url,
            token: optional_env("BASE_API_TOKEN"),
        });

        let kv = KvSettings {
            redis_url: optional_env("REDIS_URL"),
            rest_url: optional_env("KV_REST_API_URL")
                .or_else(|| optional_env("UPSTASH_REDIS_REST_URL")),
            rest_token: optional_env("KV_REST_API_TOKEN")
                .or_else(|| optional_env("UPSTASH_REDIS_REST_TOKEN")),
        };

        let defaults = GuardSettings::default();
        let guard = GuardSettings {
            rate_limit: parse_env("SUBMISSION_RATE_LIMIT", defaults.rate_limit)?,
            rate_window_secs: parse_env("SUBMISSION_RATE_WINDOW_SECS", defaults.rate_window_secs)?,
            idempotency_ttl_secs: parse_env("IDEMPOTENCY_TTL_SECS", defaults.idempotency_ttl_secs)?,
        };

        Ok(Config {
            cms,
            webhooks,
            base,
            kv,
            guard,
            http_timeout_secs: parse_env("HTTP_TIMEOUT_SECS", 10)?,
            port: parse_env("PORT", 8080)?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    optional_env(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Reads a variable, treating empty strings as unset.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}

pub(crate) fn parse_routes(raw: &str) -> Result<Vec<WebhookRoute>> {
    let routes: Vec<WebhookRoute> =
        serde_json::from_str(raw).context("LARK_WEBHOOK_ROUTES must be a JSON array of {match, url}")?;
    Ok(routes
        .into_iter()
        .filter(|r| !r.pattern.trim().is_empty() && !r.url.trim().is_empty())
        .collect())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
