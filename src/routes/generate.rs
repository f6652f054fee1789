use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::Instrument;
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::generation::{
    GenerationOutcome, GenerationRequest, ProductDescription, Provider, UseCase,
};

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub content: String,
    pub use_case: UseCase,
    pub provider: Provider,
    pub model_used: String,
    pub finish_reason: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub cost_usd: Decimal,
    pub latency_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<ProductDescription>,
    pub log_id: Uuid,
}

impl From<GenerationOutcome> for GenerateResponse {
    fn from(outcome: GenerationOutcome) -> Self {
        let result = outcome.result;
        Self {
            content: result.content,
            use_case: result.use_case,
            provider: result.provider,
            model_used: result.model_used,
            finish_reason: result.finish_reason,
            prompt_tokens: result.prompt_tokens,
            completion_tokens: result.completion_tokens,
            total_tokens: result.total_tokens,
            cost_usd: result.cost_usd,
            latency_ms: result.latency_ms,
            structured: outcome.structured,
            items: outcome.items,
            description: outcome.description,
            log_id: outcome.log_id,
        }
    }
}

/// The attempt runs on its own task and finishes, audit record included,
/// even if this request future is dropped.
pub async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerationRequest>,
) -> AppResult<Json<GenerateResponse>> {
    let service = state.service.clone();
    let attempt = tokio::spawn(async move { service.generate(request).await }.in_current_span());

    let outcome = attempt
        .await
        .map_err(|e| AppError::Internal(format!("generation task failed: {e}")))??;

    Ok(Json(outcome.into()))
}
