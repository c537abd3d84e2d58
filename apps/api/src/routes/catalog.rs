//! Read-only handlers backed by microCMS.

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::cms::models::{Article, Job, JobCategory, ListResponse, Municipality, Prefecture, Tag};
use crate::cms::query::JobSearch;
use crate::errors::AppError;
use crate::extract::{AppPath, AppQuery};
use crate::state::AppState;

const DEFAULT_FEATURED: u32 = 6;
const DEFAULT_RELATED: u32 = 4;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub category: Option<String>,
}

/// GET /api/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    AppQuery(search): AppQuery<JobSearch>,
) -> Result<Json<ListResponse<Job>>, AppError> {
    Ok(Json(state.cms.list_jobs(&search).await?))
}

/// GET /api/jobs/featured
pub async fn featured_jobs(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<LimitQuery>,
) -> Result<Json<Vec<Job>>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_FEATURED);
    Ok(Json(state.cms.featured_jobs(limit).await?))
}

/// GET /api/jobs/:id
pub async fn get_job(
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> Result<Json<Job>, AppError> {
    Ok(Json(state.cms.get_job(&id).await?))
}

/// GET /api/jobs/:id/related
pub async fn related_jobs(
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
    AppQuery(params): AppQuery<LimitQuery>,
) -> Result<Json<Vec<Job>>, AppError> {
    let job = state.cms.get_job(&id).await?;
    let limit = params.limit.unwrap_or(DEFAULT_RELATED);
    Ok(Json(state.cms.related_jobs(&job, limit).await?))
}

/// GET /api/prefectures
pub async fn list_prefectures(
    State(state): State<AppState>,
) -> Result<Json<Vec<Prefecture>>, AppError> {
    Ok(Json(state.cms.list_prefectures().await?))
}

/// GET /api/prefectures/:id/municipalities
pub async fn list_municipalities(
    State(state): State<AppState>,
    AppPath(prefecture_id): AppPath<String>,
) -> Result<Json<Vec<Municipality>>, AppError> {
    Ok(Json(state.cms.list_municipalities(&prefecture_id).await?))
}

/// GET /api/tags
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<Tag>>, AppError> {
    Ok(Json(state.cms.list_tags().await?))
}

/// GET /api/job-categories
pub async fn list_job_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<JobCategory>>, AppError> {
    Ok(Json(state.cms.list_job_categories().await?))
}

/// GET /api/articles
pub async fn list_articles(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<ArticleQuery>,
) -> Result<Json<ListResponse<Article>>, AppError> {
    let category = params
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    Ok(Json(
        state
            .cms
            .list_articles(params.page, params.per_page, category)
            .await?,
    ))
}

/// GET /api/articles/:id
pub async fn get_article(
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> Result<Json<Article>, AppError> {
    Ok(Json(state.cms.get_article(&id).await?))
}
