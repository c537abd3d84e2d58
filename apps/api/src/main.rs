mod cms;
mod config;
mod errors;
mod extract;
mod guard;
mod kv;
mod lark;
mod routes;
mod state;
mod submissions;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log,
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting RIDE JOB API v{}", env!("CARGO_PKG_VERSION"));
    info!("microCMS endpoint: {}", config.cms.base_url);

    if config.webhooks.application_fallback().is_none() && config.webhooks.routes.is_empty() {
        tracing::warn!("No Lark webhook configured for applications; submissions will be refused");
    }
    if config.base.is_some() {
        info!("Base registration forwarding enabled");
    }

    let state = AppState::new(config.clone())?;
    info!("KV backend ready: {}", state.kv.backend());

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
