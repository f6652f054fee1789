pub mod writer;

pub use writer::AuditLogWriter;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::StoreError;
use crate::generation::{GenerationResult, UseCase};

/// Provider/model recorded when a call failed before a configuration was
/// known.
pub const UNKNOWN: &str = "unknown";

/// One generation attempt as persisted in `ai_logs`. Never updated.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct InvocationLogRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub use_case: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub provider: String,
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i32>,
    pub system_prompt: Option<String>,
    pub user_prompt: String,
    pub response_content: Option<String>,
    pub finish_reason: Option<String>,
    pub prompt_tokens: Option<i32>,
    pub completion_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
    pub cost_usd: Option<Decimal>,
    pub latency_ms: Option<i32>,
    pub success: bool,
    pub error_message: Option<String>,
    pub user_id: Option<Uuid>,
}

/// A record before the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvocationLog {
    pub use_case: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub provider: String,
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i32>,
    pub system_prompt: Option<String>,
    pub user_prompt: String,
    pub response_content: Option<String>,
    pub finish_reason: Option<String>,
    pub prompt_tokens: Option<i32>,
    pub completion_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
    pub cost_usd: Option<Decimal>,
    pub latency_ms: Option<i32>,
    pub success: bool,
    pub error_message: Option<String>,
    pub user_id: Option<Uuid>,
}

fn saturating_i32(value: impl TryInto<i32>) -> i32 {
    value.try_into().unwrap_or(i32::MAX)
}

impl NewInvocationLog {
    pub fn success(result: &GenerationResult) -> Self {
        Self {
            use_case: result.use_case.as_str().to_string(),
            entity_type: None,
            entity_id: None,
            provider: result.provider.as_str().to_string(),
            model: result.model_used.clone(),
            temperature: Some(result.temperature),
            max_tokens: Some(result.max_tokens),
            system_prompt: Some(result.system_prompt.clone()),
            user_prompt: result.user_prompt.clone(),
            response_content: Some(result.content.clone()),
            finish_reason: Some(result.finish_reason.clone()),
            prompt_tokens: Some(saturating_i32(result.prompt_tokens)),
            completion_tokens: Some(saturating_i32(result.completion_tokens)),
            total_tokens: Some(saturating_i32(result.total_tokens)),
            cost_usd: Some(result.cost_usd),
            latency_ms: Some(saturating_i32(result.latency_ms)),
            success: true,
            error_message: None,
            user_id: None,
        }
    }

    /// A response was obtained but the caller rejected it. Metrics and
    /// content are kept for cost attribution.
    pub fn rejected(result: &GenerationResult, error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(error_message.into()),
            ..Self::success(result)
        }
    }

    /// No response was obtained. `raw_request` is the serialized caller
    /// request.
    pub fn failure(
        use_case: UseCase,
        raw_request: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            use_case: use_case.as_str().to_string(),
            entity_type: None,
            entity_id: None,
            provider: UNKNOWN.to_string(),
            model: UNKNOWN.to_string(),
            temperature: None,
            max_tokens: None,
            system_prompt: None,
            user_prompt: raw_request.into(),
            response_content: None,
            finish_reason: None,
            prompt_tokens: None,
            completion_tokens: None,
            total_tokens: None,
            cost_usd: None,
            latency_ms: None,
            success: false,
            error_message: Some(error_message.into()),
            user_id: None,
        }
    }

    pub fn for_entity(mut self, entity_type: Option<String>, entity_id: Option<Uuid>) -> Self {
        self.entity_type = entity_type;
        self.entity_id = entity_id;
        self
    }

    pub fn triggered_by(mut self, user_id: Option<Uuid>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn into_record(self, id: Uuid, created_at: DateTime<Utc>) -> InvocationLogRecord {
        InvocationLogRecord {
            id,
            created_at,
            use_case: self.use_case,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            provider: self.provider,
            model: self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            system_prompt: self.system_prompt,
            user_prompt: self.user_prompt,
            response_content: self.response_content,
            finish_reason: self.finish_reason,
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self.total_tokens,
            cost_usd: self.cost_usd,
            latency_ms: self.latency_ms,
            success: self.success,
            error_message: self.error_message,
            user_id: self.user_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LogFilter {
    pub use_case: Option<UseCase>,
    pub success: Option<bool>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
}

impl LogFilter {
    pub fn matches(&self, record: &InvocationLogRecord) -> bool {
        self.use_case.is_none_or(|u| record.use_case == u.as_str())
            && self.success.is_none_or(|s| record.success == s)
            && self
                .entity_type
                .as_deref()
                .is_none_or(|t| record.entity_type.as_deref() == Some(t))
            && self.entity_id.is_none_or(|id| record.entity_id == Some(id))
    }
}

/// Inclusive `created_at` bounds; an open side is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.is_none_or(|s| at >= s) && self.end.is_none_or(|e| at <= e)
    }
}

/// Append-only persistence for invocation records.
#[async_trait::async_trait]
pub trait AuditLogStore: Send + Sync {
    async fn insert(&self, log: NewInvocationLog) -> Result<InvocationLogRecord, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<InvocationLogRecord>, StoreError>;

    /// Newest first.
    async fn query(
        &self,
        filter: &LogFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<InvocationLogRecord>, StoreError>;

    async fn count(&self, filter: &LogFilter) -> Result<i64, StoreError>;

    /// Sum of `cost_usd` over successful records in the range.
    async fn sum_cost(&self, range: DateRange) -> Result<Decimal, StoreError>;
}
