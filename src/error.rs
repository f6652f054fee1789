use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use opentelemetry::trace::TraceContextExt;
use serde_json::json;
use thiserror::Error;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::db::StoreError;
use crate::generation::{GenerationError, MalformedStructuredOutput, ServiceError, UseCase};
use crate::llm::DispatchError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No active AI configuration for use case {0}")]
    ConfigNotFound(UseCase),

    #[error("Dispatch error: {0}")]
    Dispatch(DispatchError),

    #[error("Malformed output: {0}")]
    MalformedOutput(#[from] MalformedStructuredOutput),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::ConfigNotFound(use_case) => AppError::ConfigNotFound(use_case),
            GenerationError::Dispatch { source, .. } => AppError::Dispatch(source),
            GenerationError::Store(err) => AppError::Store(err),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidRequest(reason) => AppError::Validation(reason),
            ServiceError::Generation(err) => err.into(),
            ServiceError::Malformed(err) => AppError::MalformedOutput(err),
            ServiceError::Audit(err) => AppError::Store(err),
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::ConfigNotFound(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Dispatch(_)
            | AppError::MalformedOutput(_)
            | AppError::Store(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn get_trace_id() -> Option<String> {
    let span = Span::current();
    let context = span.context();
    let span_ref = context.span();
    let span_context = span_ref.span_context();

    if span_context.is_valid() {
        Some(span_context.trace_id().to_string())
    } else {
        None
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match &self {
            AppError::Validation(_) | AppError::NotFound(_) | AppError::ConfigNotFound(_) => {
                self.to_string()
            }
            AppError::Dispatch(e) => {
                tracing::error!(error = %e, error.type = e.kind(), "Dispatch error");
                "Content generation failed".to_string()
            }
            AppError::MalformedOutput(e) => {
                tracing::error!(error = %e, "Malformed model output");
                "Content generation returned invalid output".to_string()
            }
            AppError::Store(e) => {
                tracing::error!(error = %e, "Store error");
                "Internal server error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                "Internal server error".to_string()
            }
        };

        let body = if let Some(trace_id) = get_trace_id() {
            json!({
                "error": error_message,
                "status": status.as_u16(),
                "trace_id": trace_id,
            })
        } else {
            json!({
                "error": error_message,
                "status": status.as_u16(),
            })
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let error = AppError::Validation("limit must be positive".to_string());
        assert_eq!(error.to_string(), "Validation error: limit must be positive");
    }

    #[test]
    fn test_config_not_found_error() {
        let error = AppError::ConfigNotFound(UseCase::ProductTags);
        assert_eq!(
            error.to_string(),
            "No active AI configuration for use case product_tags"
        );
    }

    #[test]
    fn test_error_status_codes() {
        let test_cases = vec![
            (AppError::Validation("test".to_string()), StatusCode::BAD_REQUEST),
            (AppError::ConfigNotFound(UseCase::PostTags), StatusCode::BAD_REQUEST),
            (AppError::NotFound("test".to_string()), StatusCode::NOT_FOUND),
            (
                AppError::Dispatch(DispatchError::EmptyResponse),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::MalformedOutput(MalformedStructuredOutput {
                    use_case: UseCase::PostSeoAll,
                    reason: "test".to_string(),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::Store(StoreError::Unavailable("test".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AppError::Internal("test".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected_status) in test_cases {
            assert_eq!(error.status_code(), expected_status, "{error}");
            assert_eq!(error.into_response().status(), expected_status);
        }
    }

    #[test]
    fn test_from_generation_error() {
        let err: AppError = GenerationError::ConfigNotFound(UseCase::PostTags).into();
        assert!(matches!(err, AppError::ConfigNotFound(UseCase::PostTags)));

        let err: AppError = GenerationError::dispatch(DispatchError::Timeout("30s".into())).into();
        assert!(matches!(err, AppError::Dispatch(DispatchError::Timeout(_))));
    }

    #[test]
    fn test_from_service_error() {
        let err: AppError =
            ServiceError::Audit(StoreError::Unavailable("offline".to_string())).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err: AppError = ServiceError::InvalidRequest("entity_type too long".into()).into();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_internal_body_hides_details() {
        let response =
            AppError::Dispatch(DispatchError::Auth("sk-secret rejected".into())).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body["error"], "Content generation failed");
        assert_eq!(body["status"], 500);
        assert!(!bytes.windows(9).any(|w| w == b"sk-secret"));
    }
}
