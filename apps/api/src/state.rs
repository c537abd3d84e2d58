use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

use crate::cms::CmsClient;
use crate::config::Config;
use crate::guard::SubmissionGuard;
use crate::kv::{build_store, KvStore};
use crate::lark::LarkClient;
use crate::submissions::base::BaseClient;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub cms: CmsClient,
    pub lark: LarkClient,
    /// Present only when `BASE_REGISTRATION_URL` is set.
    pub base: Option<BaseClient>,
    pub kv: Arc<dyn KvStore>,
    pub guard: SubmissionGuard,
}

impl AppState {
    /// Wires every client from configuration. All outbound calls share one
    /// connection pool.
    pub fn new(config: Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(concat!("ridejob-api/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        let kv = build_store(&config.kv, http.clone())?;
        Ok(Self::with_kv(config, http, kv))
    }

    pub fn with_kv(config: Config, http: Client, kv: Arc<dyn KvStore>) -> Self {
        let cms = CmsClient::new(http.clone(), &config.cms.base_url, &config.cms.api_key);
        let base = config
            .base
            .clone()
            .map(|settings| BaseClient::new(http.clone(), settings));
        let guard = SubmissionGuard::new(Arc::clone(&kv), config.guard.clone());

        Self {
            cms,
            lark: LarkClient::new(http),
            base,
            kv,
            guard,
            config,
        }
    }
}
