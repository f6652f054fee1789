//! In-process stores with the same contracts as the Postgres ones. Used as
//! fixtures by the test suites.

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::StoreError;
use crate::audit::{AuditLogStore, DateRange, InvocationLogRecord, LogFilter, NewInvocationLog};
use crate::generation::{ConfigStore, GenerationConfig, UseCase};

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

#[derive(Default)]
pub struct MemoryConfigStore {
    configs: RwLock<Vec<GenerationConfig>>,
    unavailable: AtomicBool,
}

impl MemoryConfigStore {
    pub fn with_configs(configs: impl IntoIterator<Item = GenerationConfig>) -> Self {
        Self {
            configs: RwLock::new(configs.into_iter().collect()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("config store offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn get_active_config(
        &self,
        use_case: UseCase,
    ) -> Result<Option<GenerationConfig>, StoreError> {
        self.check()?;
        let configs = self.configs.read().map_err(poisoned)?;
        Ok(configs
            .iter()
            .find(|c| c.use_case == use_case && c.is_active)
            .cloned())
    }

    async fn list_active(&self) -> Result<Vec<GenerationConfig>, StoreError> {
        self.check()?;
        let configs = self.configs.read().map_err(poisoned)?;
        let mut active: Vec<_> = configs.iter().filter(|c| c.is_active).cloned().collect();
        active.sort_by_key(|c| c.use_case.as_str());
        Ok(active)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }
}

#[derive(Default)]
pub struct MemoryAuditLogStore {
    records: RwLock<Vec<InvocationLogRecord>>,
    unavailable: AtomicBool,
}

impl MemoryAuditLogStore {
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("audit log store offline".to_string()))
        } else {
            Ok(())
        }
    }

    /// Every record, newest first.
    pub fn snapshot(&self) -> Vec<InvocationLogRecord> {
        self.records
            .read()
            .map(|records| records.iter().rev().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl AuditLogStore for MemoryAuditLogStore {
    async fn insert(&self, log: NewInvocationLog) -> Result<InvocationLogRecord, StoreError> {
        self.check()?;
        let record = log.into_record(Uuid::new_v4(), Utc::now());
        self.records.write().map_err(poisoned)?.push(record.clone());
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<InvocationLogRecord>, StoreError> {
        self.check()?;
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn query(
        &self,
        filter: &LogFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<InvocationLogRecord>, StoreError> {
        self.check()?;
        let records = self.records.read().map_err(poisoned)?;
        // insertion order is creation order
        Ok(records
            .iter()
            .rev()
            .filter(|r| filter.matches(r))
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn count(&self, filter: &LogFilter) -> Result<i64, StoreError> {
        self.check()?;
        let records = self.records.read().map_err(poisoned)?;
        let count = records.iter().filter(|r| filter.matches(r)).count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn sum_cost(&self, range: DateRange) -> Result<Decimal, StoreError> {
        self.check()?;
        let records = self.records.read().map_err(poisoned)?;
        Ok(records
            .iter()
            .filter(|r| r.success && range.contains(r.created_at))
            .filter_map(|r| r.cost_usd)
            .sum())
    }
}
