pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod generation;
pub mod llm;
pub mod routes;
pub mod telemetry;

pub use config::Config;

use std::sync::Arc;

use audit::{AuditLogStore, AuditLogWriter};
use generation::{ConfigStore, GenerationService, Orchestrator};
use llm::{DispatchClient, PricingTable};

#[derive(Clone)]
pub struct AppState {
    pub service: GenerationService,
    pub configs: Arc<dyn ConfigStore>,
    pub logs: Arc<dyn AuditLogStore>,
    pub pricing: Arc<PricingTable>,
}

impl AppState {
    pub fn new(
        configs: Arc<dyn ConfigStore>,
        logs: Arc<dyn AuditLogStore>,
        dispatch: Arc<dyn DispatchClient>,
        pricing: Arc<PricingTable>,
    ) -> Self {
        let orchestrator = Orchestrator::new(configs.clone(), dispatch, pricing.clone());
        let service = GenerationService::new(orchestrator, AuditLogWriter::new(logs.clone()));

        Self {
            service,
            configs,
            logs,
            pricing,
        }
    }
}
