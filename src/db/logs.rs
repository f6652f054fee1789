use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use super::StoreError;
use crate::audit::{AuditLogStore, DateRange, InvocationLogRecord, LogFilter, NewInvocationLog};

const LOG_COLUMNS: &str = "id, created_at, use_case, entity_type, entity_id, provider, model, \
     temperature, max_tokens, system_prompt, user_prompt, response_content, finish_reason, \
     prompt_tokens, completion_tokens, total_tokens, cost_usd, latency_ms, success, \
     error_message, user_id";

/// Shared by `query` and `count`; binds `$1..$4` from [`LogFilter`].
const FILTER_CLAUSE: &str = "($1::text IS NULL OR use_case = $1) \
     AND ($2::boolean IS NULL OR success = $2) \
     AND ($3::text IS NULL OR entity_type = $3) \
     AND ($4::uuid IS NULL OR entity_id = $4)";

#[derive(Clone)]
pub struct PgAuditLogStore {
    pool: PgPool,
}

impl PgAuditLogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AuditLogStore for PgAuditLogStore {
    #[instrument(name = "db.ai_logs.insert", skip_all, fields(use_case = %log.use_case))]
    async fn insert(&self, log: NewInvocationLog) -> Result<InvocationLogRecord, StoreError> {
        let record = sqlx::query_as::<_, InvocationLogRecord>(&format!(
            "INSERT INTO ai_logs \
             (use_case, entity_type, entity_id, provider, model, temperature, max_tokens, \
              system_prompt, user_prompt, response_content, finish_reason, prompt_tokens, \
              completion_tokens, total_tokens, cost_usd, latency_ms, success, error_message, \
              user_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
                     $17, $18, $19) \
             RETURNING {LOG_COLUMNS}"
        ))
        .bind(&log.use_case)
        .bind(&log.entity_type)
        .bind(log.entity_id)
        .bind(&log.provider)
        .bind(&log.model)
        .bind(log.temperature)
        .bind(log.max_tokens)
        .bind(&log.system_prompt)
        .bind(&log.user_prompt)
        .bind(&log.response_content)
        .bind(&log.finish_reason)
        .bind(log.prompt_tokens)
        .bind(log.completion_tokens)
        .bind(log.total_tokens)
        .bind(log.cost_usd)
        .bind(log.latency_ms)
        .bind(log.success)
        .bind(&log.error_message)
        .bind(log.user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    #[instrument(name = "db.ai_logs.get", skip(self))]
    async fn get(&self, id: Uuid) -> Result<Option<InvocationLogRecord>, StoreError> {
        let record = sqlx::query_as::<_, InvocationLogRecord>(&format!(
            "SELECT {LOG_COLUMNS} FROM ai_logs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    #[instrument(name = "db.ai_logs.query", skip(self))]
    async fn query(
        &self,
        filter: &LogFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<InvocationLogRecord>, StoreError> {
        let records = sqlx::query_as::<_, InvocationLogRecord>(&format!(
            "SELECT {LOG_COLUMNS} FROM ai_logs WHERE {FILTER_CLAUSE} \
             ORDER BY created_at DESC LIMIT $5 OFFSET $6"
        ))
        .bind(filter.use_case.map(|u| u.as_str()))
        .bind(filter.success)
        .bind(&filter.entity_type)
        .bind(filter.entity_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    #[instrument(name = "db.ai_logs.count", skip(self))]
    async fn count(&self, filter: &LogFilter) -> Result<i64, StoreError> {
        let (count,): (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM ai_logs WHERE {FILTER_CLAUSE}"))
                .bind(filter.use_case.map(|u| u.as_str()))
                .bind(filter.success)
                .bind(&filter.entity_type)
                .bind(filter.entity_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    #[instrument(name = "db.ai_logs.sum_cost", skip(self))]
    async fn sum_cost(&self, range: DateRange) -> Result<Decimal, StoreError> {
        let (total,): (Option<Decimal>,) = sqlx::query_as(
            "SELECT SUM(cost_usd) FROM ai_logs \
             WHERE success = TRUE \
               AND ($1::timestamptz IS NULL OR created_at >= $1) \
               AND ($2::timestamptz IS NULL OR created_at <= $2)",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.pool)
        .await?;

        Ok(total.unwrap_or(Decimal::ZERO))
    }
}
