use std::sync::Arc;

use opentelemetry::KeyValue;

use super::{AuditLogStore, InvocationLogRecord, NewInvocationLog};
use crate::db::StoreError;
use crate::telemetry::metrics::AUDIT_WRITE_FAILURES;

/// Persists exactly the record it is given. A store failure is logged and
/// returned, never swallowed.
#[derive(Clone)]
pub struct AuditLogWriter {
    store: Arc<dyn AuditLogStore>,
}

impl AuditLogWriter {
    pub fn new(store: Arc<dyn AuditLogStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn AuditLogStore> {
        &self.store
    }

    #[tracing::instrument(
        name = "audit.record",
        skip_all,
        fields(use_case = %log.use_case, success = log.success, log_id = tracing::field::Empty)
    )]
    pub async fn record(&self, log: NewInvocationLog) -> Result<InvocationLogRecord, StoreError> {
        let use_case = log.use_case.clone();

        match self.store.insert(log).await {
            Ok(record) => {
                tracing::Span::current().record("log_id", tracing::field::display(record.id));
                Ok(record)
            }
            Err(err) => {
                AUDIT_WRITE_FAILURES.add(1, &[KeyValue::new("use_case", use_case.clone())]);
                tracing::error!(use_case = %use_case, error = %err, "Failed to write AI audit log");
                Err(err)
            }
        }
    }
}
