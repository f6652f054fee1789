#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use content_engine::AppState;
use content_engine::db::memory::{MemoryAuditLogStore, MemoryConfigStore};
use content_engine::generation::GenerationConfig;
use content_engine::llm::{
    DispatchClient, DispatchError, DispatchRequest, DispatchResponse, PricingTable, Usage,
};

/// Dispatch client that records requests and replies from a fixed script.
pub struct StubDispatch {
    calls: Mutex<Vec<DispatchRequest>>,
    reply: Result<DispatchResponse, DispatchError>,
    delay: Duration,
}

impl StubDispatch {
    pub fn replying(text: &str, model: &str, usage: Option<Usage>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            reply: Ok(DispatchResponse {
                text: text.to_string(),
                model: model.to_string(),
                finish_reason: "stop".to_string(),
                usage,
            }),
            delay: Duration::ZERO,
        })
    }

    /// Like `replying`, but the call takes `delay` to answer.
    pub fn replying_after(delay: Duration, text: &str, model: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            reply: Ok(DispatchResponse {
                text: text.to_string(),
                model: model.to_string(),
                finish_reason: "stop".to_string(),
                usage: Some(Usage::new(10, 5)),
            }),
            delay,
        })
    }

    pub fn failing(err: DispatchError) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            reply: Err(err),
            delay: Duration::ZERO,
        })
    }

    pub fn calls(&self) -> Vec<DispatchRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl DispatchClient for StubDispatch {
    async fn complete(&self, req: &DispatchRequest) -> Result<DispatchResponse, DispatchError> {
        self.calls.lock().unwrap().push(req.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.reply.clone()
    }
}

pub struct Harness {
    pub state: AppState,
    pub dispatch: Arc<StubDispatch>,
    pub configs: Arc<MemoryConfigStore>,
    pub logs: Arc<MemoryAuditLogStore>,
}

pub fn harness(configs: Vec<GenerationConfig>, dispatch: Arc<StubDispatch>) -> Harness {
    let config_store = Arc::new(MemoryConfigStore::with_configs(configs));
    let log_store = Arc::new(MemoryAuditLogStore::default());
    let state = AppState::new(
        config_store.clone(),
        log_store.clone(),
        dispatch.clone(),
        Arc::new(PricingTable::builtin().unwrap()),
    );

    Harness {
        state,
        dispatch,
        configs: config_store,
        logs: log_store,
    }
}
