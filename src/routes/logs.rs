use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::audit::{DateRange, InvocationLogRecord, LogFilter};
use crate::error::{AppError, AppResult};
use crate::generation::UseCase;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub use_case: Option<UseCase>,
    pub success: Option<bool>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LogPage {
    pub items: Vec<InvocationLogRecord>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct CostQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct CostSummary {
    pub total_cost_usd: Decimal,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

fn page_bounds(limit: Option<i64>, offset: Option<i64>) -> AppResult<(i64, i64)> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT);
    let offset = offset.unwrap_or(0);

    if limit < 1 {
        return Err(AppError::Validation("limit must be at least 1".into()));
    }
    if offset < 0 {
        return Err(AppError::Validation("offset must not be negative".into()));
    }

    Ok((limit.min(MAX_LIMIT), offset))
}

pub async fn list_logs(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> AppResult<Json<LogPage>> {
    let (limit, offset) = page_bounds(params.limit, params.offset)?;

    let filter = LogFilter {
        use_case: params.use_case,
        success: params.success,
        entity_type: params.entity_type,
        entity_id: params.entity_id,
    };

    let items = state.logs.query(&filter, limit, offset).await?;
    let total = state.logs.count(&filter).await?;

    Ok(Json(LogPage {
        items,
        total,
        limit,
        offset,
    }))
}

pub async fn get_log(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<InvocationLogRecord>> {
    let record = state
        .logs
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("AI log {id} not found")))?;

    Ok(Json(record))
}

/// Total cost of successful calls between `start` and `end`, both inclusive.
pub async fn total_cost(
    State(state): State<AppState>,
    Query(params): Query<CostQuery>,
) -> AppResult<Json<CostSummary>> {
    if let (Some(start), Some(end)) = (params.start, params.end)
        && start > end
    {
        return Err(AppError::Validation("start must not be after end".into()));
    }

    let total_cost_usd = state
        .logs
        .sum_cost(DateRange {
            start: params.start,
            end: params.end,
        })
        .await?;

    Ok(Json(CostSummary {
        total_cost_usd,
        start: params.start,
        end: params.end,
    }))
}
