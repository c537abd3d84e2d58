//! Axum route handlers for form submissions.

use axum::{extract::State, http::HeaderMap, Json};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::extract::AppJson;
use crate::guard::{client_key, idempotency_key, Claim};
use crate::state::AppState;
use crate::submissions::application::ApplicationPayload;
use crate::submissions::base::{forward, BaseOutcome};
use crate::submissions::dispatch::{notify_all, DeliverySummary};
use crate::submissions::inquiry::InquiryPayload;
use crate::submissions::routing::WebhookRouter;

const APPLICATION_SCOPE: &str = "application";
const CONTACT_SCOPE: &str = "contact";

// ────────────────────────────────────────────────────────────────────────────
// Response
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize)]
pub struct SubmissionResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub duplicate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<BaseOutcome>,
}

impl SubmissionResponse {
    /// Reply to a retried submission. `original` is the id it was relayed
    /// under, when that is known.
    fn duplicate(original: Option<&str>) -> Self {
        Self {
            ok: true,
            id: original.and_then(|id| Uuid::parse_str(id).ok()),
            duplicate: true,
            ..Default::default()
        }
    }

    fn relayed(id: Uuid, summary: DeliverySummary, base: Option<BaseOutcome>) -> Self {
        Self {
            ok: true,
            id: Some(id),
            duplicate: false,
            delivered: Some(summary.delivered),
            failed: Some(summary.failed),
            base,
        }
    }
}

/// Calendar date in Japan, used for age checks.
fn japan_today(now: DateTime<Utc>) -> NaiveDate {
    match FixedOffset::east_opt(9 * 3600) {
        Some(jst) => now.with_timezone(&jst).date_naive(),
        None => now.date_naive(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/applications
///
/// Validates the form, routes it to the matching Lark webhook(s) and, once at
/// least one notification went through, forwards it to Base.
pub async fn handle_application(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(payload): AppJson<ApplicationPayload>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let idempotency = idempotency_key(&headers)?;
    let submitted_at = Utc::now();

    let mut application = payload
        .validate(japan_today(submitted_at))
        .map_err(AppError::InvalidPayload)?;

    state
        .guard
        .check_rate(APPLICATION_SCOPE, &client_key(&headers))
        .await?;

    if application.needs_job_details() {
        if let Some(job_id) = application.job_id.clone() {
            match state.cms.get_job(&job_id).await {
                Ok(job) => application.fill_from_job(&job),
                Err(e) => warn!("Could not resolve job {job_id} for application: {e}"),
            }
        }
    }

    let webhooks = &state.config.webhooks;
    let urls = WebhookRouter::new(
        &webhooks.routes,
        webhooks.application_fallback(),
        &webhooks.cc_urls,
    )
    .select(
        application.company_name.as_deref(),
        application.job_title.as_deref(),
    );
    if urls.is_empty() {
        return Err(AppError::NotConfigured(
            "no Lark webhook configured for applications".to_string(),
        ));
    }

    let id = Uuid::new_v4();
    let claim = state
        .guard
        .claim(APPLICATION_SCOPE, idempotency.as_deref())
        .await;
    if let Claim::Duplicate(original) = &claim {
        info!("Duplicate application submission ignored");
        return Ok(Json(SubmissionResponse::duplicate(original.as_deref())));
    }

    info!(
        "Relaying application {id} (job {}) to {} webhook(s)",
        application.job_id.as_deref().unwrap_or("-"),
        urls.len()
    );

    let summary = notify_all(&state.lark, &urls, application.to_card(id, submitted_at)).await;
    if summary.delivered == 0 {
        state.guard.release(&claim).await;
        return Err(AppError::Upstream(format!(
            "all {} webhook(s) failed for application {id}",
            summary.failed
        )));
    }

    state.guard.complete(&claim, &id.to_string()).await;

    let base = forward(state.base.as_ref(), &application, id, submitted_at).await;

    Ok(Json(SubmissionResponse::relayed(id, summary, Some(base))))
}

/// POST /api/contact
pub async fn handle_contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(payload): AppJson<InquiryPayload>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let idempotency = idempotency_key(&headers)?;
    let submitted_at = Utc::now();

    let inquiry = payload.validate().map_err(AppError::InvalidPayload)?;

    state
        .guard
        .check_rate(CONTACT_SCOPE, &client_key(&headers))
        .await?;

    let Some(url) = state.config.webhooks.contact_fallback() else {
        return Err(AppError::NotConfigured(
            "no Lark webhook configured for inquiries".to_string(),
        ));
    };

    let id = Uuid::new_v4();
    let claim = state
        .guard
        .claim(CONTACT_SCOPE, idempotency.as_deref())
        .await;
    if let Claim::Duplicate(original) = &claim {
        info!("Duplicate inquiry submission ignored");
        return Ok(Json(SubmissionResponse::duplicate(original.as_deref())));
    }

    info!("Relaying inquiry {id} ({:?})", inquiry.kind);

    let summary = notify_all(
        &state.lark,
        &[url.to_string()],
        inquiry.to_card(id, submitted_at),
    )
    .await;
    if summary.delivered == 0 {
        state.guard.release(&claim).await;
        return Err(AppError::Upstream(format!(
            "webhook failed for inquiry {id}"
        )));
    }

    state.guard.complete(&claim, &id.to_string()).await;

    Ok(Json(SubmissionResponse::relayed(id, summary, None)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_japan_today_crosses_midnight() {
        // 2025-03-31 16:30 UTC is already April 1st in Japan
        let now = Utc.with_ymd_and_hms(2025, 3, 31, 16, 30, 0).unwrap();
        assert_eq!(japan_today(now), NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
    }

    #[test]
    fn test_duplicate_response_shape() {
        let value = serde_json::to_value(SubmissionResponse::duplicate(None)).unwrap();
        assert_eq!(value, serde_json::json!({"ok": true, "duplicate": true}));

        let original = "67e55044-10b1-426f-9247-bb680e5fe0c8";
        let value = serde_json::to_value(SubmissionResponse::duplicate(Some(original))).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"ok": true, "id": original, "duplicate": true})
        );
    }

    #[test]
    fn test_relayed_response_reports_counts() {
        let id = Uuid::new_v4();
        let summary = DeliverySummary {
            delivered: 2,
            failed: 1,
        };
        let value =
            serde_json::to_value(SubmissionResponse::relayed(id, summary, Some(BaseOutcome::Skipped)))
                .unwrap();
        assert_eq!(value["delivered"], 2);
        assert_eq!(value["failed"], 1);
        assert_eq!(value["base"], "skipped");
        assert!(value.get("duplicate").is_none());
    }
}
