use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::json;

/// Full health check: probes both stores.
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let database = match state.persist.ping().await {
        Ok(()) => "up",
        Err(e) => {
            tracing::warn!(error = %e, "database health probe failed");
            "down"
        }
    };
    let vector_store = match state.store.ping().await {
        Ok(()) => "up",
        Err(e) => {
            tracing::warn!(error = %e, "vector store health probe failed");
            "down"
        }
    };

    let status = if database == "up" && vector_store == "up" {
        "ok"
    } else {
        "degraded"
    };

    Json(json!({
        "status": status,
        "database": database,
        "vector_store": vector_store,
        "server_time": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Lightweight readiness probe for orchestrators.
pub async fn readiness() -> Json<serde_json::Value> {
    Json(json!({ "status": "ready" }))
}
