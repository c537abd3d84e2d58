pub mod catalog;
pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use crate::submissions::handlers;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Jobs
        .route("/api/jobs", get(catalog::list_jobs))
        .route("/api/jobs/featured", get(catalog::featured_jobs))
        .route("/api/jobs/:id", get(catalog::get_job))
        .route("/api/jobs/:id/related", get(catalog::related_jobs))
        // Taxonomy
        .route("/api/prefectures", get(catalog::list_prefectures))
        .route(
            "/api/prefectures/:id/municipalities",
            get(catalog::list_municipalities),
        )
        .route("/api/tags", get(catalog::list_tags))
        .route("/api/job-categories", get(catalog::list_job_categories))
        // Articles
        .route("/api/articles", get(catalog::list_articles))
        .route("/api/articles/:id", get(catalog::get_article))
        // Forms
        .route("/api/applications", post(handlers::handle_application))
        .route("/api/contact", post(handlers::handle_contact))
        .with_state(state)
}
