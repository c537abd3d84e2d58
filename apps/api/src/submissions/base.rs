//! Forwarding of applications to the Base registration endpoint.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::BaseSettings;
use crate::submissions::application::Application;

#[derive(Debug, Error)]
pub enum BaseError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Base returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Result of the optional Base forwarding, echoed in the submission response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseOutcome {
    Registered,
    Failed,
    Skipped,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Registration<'a> {
    application_id: Uuid,
    #[serde(flatten)]
    application: &'a Application,
    submitted_at: DateTime<Utc>,
    origin: &'static str,
}

#[derive(Clone)]
pub struct BaseClient {
    http: Client,
    settings: BaseSettings,
}

impl BaseClient {
    pub fn new(http: Client, settings: BaseSettings) -> Self {
        Self { http, settings }
    }

    pub async fn register(
        &self,
        application: &Application,
        id: Uuid,
        submitted_at: DateTime<Utc>,
    ) -> Result<(), BaseError> {
        let body = Registration {
            application_id: id,
            application,
            submitted_at,
            origin: "ridejob",
        };

        let mut request = self.http.post(&self.settings.url).json(&body);
        if let Some(token) = &self.settings.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BaseError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!("Registered application {id} with Base");
        Ok(())
    }
}

/// Forwards to Base when configured. Failures are logged, never raised.
pub async fn forward(
    base: Option<&BaseClient>,
    application: &Application,
    id: Uuid,
    submitted_at: DateTime<Utc>,
) -> BaseOutcome {
    let Some(base) = base else {
        return BaseOutcome::Skipped;
    };
    match base.register(application, id, submitted_at).await {
        Ok(()) => BaseOutcome::Registered,
        Err(e) => {
            warn!("Base registration failed for application {id}: {e}");
            BaseOutcome::Failed
        }
    }
}
