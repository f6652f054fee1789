use opentelemetry::KeyValue;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use super::structured::{
    MalformedStructuredOutput, ProductDescription, parse_bundle, split_keywords,
    split_product_description,
};
use super::types::{GenerationContext, GenerationResult, UseCase};
use super::{GenerationError, Orchestrator};
use crate::audit::{AuditLogWriter, NewInvocationLog};
use crate::db::StoreError;
use crate::telemetry::metrics::CONTENT_GENERATION_ATTEMPTS;

/// Width of the `ai_logs.entity_type` column.
pub const ENTITY_TYPE_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub use_case: UseCase,
    #[serde(flatten)]
    pub context: GenerationContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

impl GenerationRequest {
    pub fn new(use_case: UseCase, context: GenerationContext) -> Self {
        Self {
            use_case,
            context,
            entity_type: None,
            entity_id: None,
            user_id: None,
        }
    }

    pub fn for_entity(mut self, entity_type: impl Into<String>, entity_id: Uuid) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id);
        self
    }

    pub fn triggered_by(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Checks the fields that end up in the audit record.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(entity_type) = &self.entity_type
            && entity_type.chars().count() > ENTITY_TYPE_MAX_CHARS
        {
            return Err(format!(
                "entity_type must be at most {ENTITY_TYPE_MAX_CHARS} characters"
            ));
        }
        Ok(())
    }

    fn to_audit_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub result: GenerationResult,
    /// Parsed fields for JSON-bundle use cases.
    pub structured: Option<Map<String, Value>>,
    /// Individual entries for keyword and tag use cases.
    pub items: Option<Vec<String>>,
    pub description: Option<ProductDescription>,
    pub log_id: Uuid,
}

#[derive(Debug, Default)]
struct Shaped {
    structured: Option<Map<String, Value>>,
    items: Option<Vec<String>>,
    description: Option<ProductDescription>,
}

impl Shaped {
    fn from_content(use_case: UseCase, content: &str) -> Result<Self, MalformedStructuredOutput> {
        let mut shaped = Shaped::default();
        if use_case.expects_json() {
            shaped.structured = Some(parse_bundle(use_case, content)?);
        } else if use_case.yields_list() {
            shaped.items = Some(split_keywords(content));
        } else if use_case == UseCase::ProductDescription {
            shaped.description = Some(split_product_description(content));
        }
        Ok(shaped)
    }
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Malformed(#[from] MalformedStructuredOutput),

    #[error("failed to write audit log: {0}")]
    Audit(#[source] StoreError),
}

/// Runs the orchestrator and writes exactly one audit record per attempt.
#[derive(Clone)]
pub struct GenerationService {
    orchestrator: Orchestrator,
    audit: AuditLogWriter,
}

impl GenerationService {
    pub fn new(orchestrator: Orchestrator, audit: AuditLogWriter) -> Self {
        Self {
            orchestrator,
            audit,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn audit(&self) -> &AuditLogWriter {
        &self.audit
    }

    #[tracing::instrument(
        name = "generation.service",
        skip_all,
        fields(use_case = %request.use_case, outcome = tracing::field::Empty)
    )]
    pub async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationOutcome, ServiceError> {
        let use_case = request.use_case;

        if let Err(reason) = request.validate() {
            tracing::warn!(use_case = %use_case, error = %reason, "Rejected generation request");
            let log = NewInvocationLog::failure(use_case, request.to_audit_text(), reason.clone())
                .for_entity(None, request.entity_id)
                .triggered_by(request.user_id);
            count_attempt(use_case, "invalid_request");
            self.audit.record(log).await.map_err(ServiceError::Audit)?;
            return Err(ServiceError::InvalidRequest(reason));
        }

        let (log, verdict) = match self.orchestrator.generate(use_case, &request.context).await {
            Ok(result) => match Shaped::from_content(use_case, &result.content) {
                Ok(shaped) => (NewInvocationLog::success(&result), Ok((result, shaped))),
                Err(err) => {
                    tracing::error!(
                        use_case = %use_case,
                        error = %err,
                        response = %result.content,
                        "Model returned malformed JSON bundle"
                    );
                    (
                        NewInvocationLog::rejected(&result, err.to_string()),
                        Err(ServiceError::Malformed(err)),
                    )
                }
            },
            Err(err) => {
                let message = match &err {
                    GenerationError::Dispatch { source, trace } => {
                        tracing::error!(
                            use_case = %use_case,
                            error = %source,
                            error.type = source.kind(),
                            "Generation dispatch failed"
                        );
                        format!("{source}\n\n{trace}")
                    }
                    other => {
                        tracing::warn!(use_case = %use_case, error = %other, "Generation failed");
                        other.to_string()
                    }
                };
                (
                    NewInvocationLog::failure(use_case, request.to_audit_text(), message),
                    Err(ServiceError::Generation(err)),
                )
            }
        };

        let outcome = match &verdict {
            Ok(_) => "success",
            Err(ServiceError::Malformed(_)) => "malformed_output",
            Err(ServiceError::Generation(err)) => err.kind(),
            Err(ServiceError::InvalidRequest(_)) => "invalid_request",
            Err(ServiceError::Audit(_)) => "audit_error",
        };
        count_attempt(use_case, outcome);

        let log = log
            .for_entity(request.entity_type, request.entity_id)
            .triggered_by(request.user_id);
        let record = self.audit.record(log).await.map_err(ServiceError::Audit)?;

        let (result, shaped) = verdict?;

        Ok(GenerationOutcome {
            result,
            structured: shaped.structured,
            items: shaped.items,
            description: shaped.description,
            log_id: record.id,
        })
    }
}

fn count_attempt(use_case: UseCase, outcome: &'static str) {
    tracing::Span::current().record("outcome", outcome);
    CONTENT_GENERATION_ATTEMPTS.add(
        1,
        &[
            KeyValue::new("use_case", use_case.as_str()),
            KeyValue::new("outcome", outcome),
        ],
    );
}
