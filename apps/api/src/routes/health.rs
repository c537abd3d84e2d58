use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::warn;

use crate::state::AppState;

const PROBE_KEY: &str = "health:probe";

/// GET /health
/// Returns service version, the KV backend and whether it answered a probe.
/// The service stays "ok" when the KV is down, since the guard fails open.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let kv_status = match state.kv.exists(PROBE_KEY).await {
        Ok(_) => "ok",
        Err(e) => {
            warn!("KV health probe failed: {e}");
            "unavailable"
        }
    };

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "ridejob-api",
        "kv": state.kv.backend(),
        "kvStatus": kv_status
    }))
}
