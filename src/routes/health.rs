use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use crate::AppState;

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let database = match state.configs.ping().await {
        Ok(()) => "healthy",
        Err(err) => {
            tracing::warn!(error = %err, "Health check: config store unreachable");
            "unhealthy"
        }
    };

    let status = if database == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "ok" } else { "error" },
            "database": database,
            "pricing_version": state.pricing.version,
            "service": "content-engine",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}
