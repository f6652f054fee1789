use std::sync::Arc;

use super::GenerationError;
use super::types::{GenerationConfig, UseCase};
use crate::db::StoreError;

/// Read side of the administrative configuration store.
#[async_trait::async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_active_config(
        &self,
        use_case: UseCase,
    ) -> Result<Option<GenerationConfig>, StoreError>;

    async fn list_active(&self) -> Result<Vec<GenerationConfig>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct ConfigResolver {
    store: Arc<dyn ConfigStore>,
}

impl ConfigResolver {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    #[tracing::instrument(name = "generation.resolve", skip(self), fields(use_case = %use_case))]
    pub async fn resolve(&self, use_case: UseCase) -> Result<GenerationConfig, GenerationError> {
        let config = self
            .store
            .get_active_config(use_case)
            .await?
            .filter(|c| c.is_active);

        match config {
            Some(config) => Ok(config),
            None => {
                tracing::warn!(use_case = %use_case, "No active AI configuration");
                Err(GenerationError::ConfigNotFound(use_case))
            }
        }
    }
}
