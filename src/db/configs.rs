use sqlx::PgPool;
use tracing::instrument;

use super::StoreError;
use crate::generation::{ConfigStore, GenerationConfig, UseCase};

const CONFIG_COLUMNS: &str = "id, use_case, name, description, entity, provider, model, \
     system_prompt, user_prompt, temperature, max_tokens, is_active, created_at, updated_at";

#[derive(Clone)]
pub struct PgConfigStore {
    pool: PgPool,
}

impl PgConfigStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConfigStore for PgConfigStore {
    #[instrument(name = "db.ai_configs.get_active", skip(self))]
    async fn get_active_config(
        &self,
        use_case: UseCase,
    ) -> Result<Option<GenerationConfig>, StoreError> {
        let config = sqlx::query_as::<_, GenerationConfig>(&format!(
            "SELECT {CONFIG_COLUMNS} FROM ai_configs WHERE use_case = $1 AND is_active = TRUE"
        ))
        .bind(use_case)
        .fetch_optional(&self.pool)
        .await?;

        Ok(config)
    }

    #[instrument(name = "db.ai_configs.list_active", skip(self))]
    async fn list_active(&self) -> Result<Vec<GenerationConfig>, StoreError> {
        let configs = sqlx::query_as::<_, GenerationConfig>(&format!(
            "SELECT {CONFIG_COLUMNS} FROM ai_configs WHERE is_active = TRUE ORDER BY use_case"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(configs)
    }

    #[instrument(name = "db.ping", skip(self))]
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
