use axum::{Json, extract::State};

use crate::AppState;
use crate::error::AppResult;
use crate::generation::GenerationConfig;

/// Active configurations, one per use case. Read-only.
pub async fn list_configs(State(state): State<AppState>) -> AppResult<Json<Vec<GenerationConfig>>> {
    let configs = state.configs.list_active().await?;
    Ok(Json(configs))
}
