use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::cms::CmsError;

/// A single rejected field in a submitted form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid payload ({} field errors)", .0.len())]
    InvalidPayload(Vec<FieldError>),

    #[error("Too many submissions, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("CMS error: {0}")]
    Cms(#[from] CmsError),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut details = None;
        let mut retry_after = None;

        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::InvalidPayload(errors) => {
                details = Some(json!(errors));
                (
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    "One or more fields are invalid".to_string(),
                )
            }
            AppError::RateLimited { retry_after_secs } => {
                retry_after = Some(*retry_after_secs);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "RATE_LIMITED",
                    "Too many submissions, please try again later".to_string(),
                )
            }
            AppError::Cms(CmsError::NotFound(what)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", format!("{what} not found"))
            }
            AppError::Cms(CmsError::InvalidFilter(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Cms(e) => {
                tracing::error!("CMS error: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "CMS_ERROR",
                    "Content service is unavailable".to_string(),
                )
            }
            AppError::Upstream(msg) => {
                tracing::error!("Upstream error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_ERROR",
                    "Notification delivery failed".to_string(),
                )
            }
            AppError::NotConfigured(msg) => {
                tracing::error!("Not configured: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "NOT_CONFIGURED",
                    "This endpoint is not configured".to_string(),
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some(details) = details {
            error["details"] = details;
        }

        let mut response = (status, Json(json!({ "error": error }))).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
