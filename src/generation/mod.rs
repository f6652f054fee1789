pub mod orchestrator;
pub mod render;
pub mod resolver;
pub mod service;
pub mod structured;
pub mod types;

pub use orchestrator::Orchestrator;
pub use render::{RenderMode, RenderedPrompt, render};
pub use resolver::{ConfigResolver, ConfigStore};
pub use service::{GenerationOutcome, GenerationRequest, GenerationService, ServiceError};
pub use structured::{MalformedStructuredOutput, ProductDescription};
pub use types::{
    Entity, GenerationConfig, GenerationContext, GenerationResult, Provider, UnknownUseCase,
    UseCase,
};

use std::backtrace::Backtrace;

use thiserror::Error;

use crate::db::StoreError;
use crate::llm::DispatchError;

/// Failures surfaced by [`Orchestrator::generate`]. Nothing is recovered
/// locally; the caller owns auditing and retry decisions.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("no active configuration for use case {0}")]
    ConfigNotFound(UseCase),

    #[error("dispatch failed: {source}")]
    Dispatch {
        source: DispatchError,
        /// Captured at the failure site for the audit record.
        trace: String,
    },

    #[error("configuration store failed: {0}")]
    Store(#[from] StoreError),
}

impl GenerationError {
    pub fn dispatch(source: DispatchError) -> Self {
        GenerationError::Dispatch {
            source,
            trace: Backtrace::force_capture().to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::ConfigNotFound(_) => "config_not_found",
            GenerationError::Dispatch { .. } => "dispatch_error",
            GenerationError::Store(_) => "store_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_not_found_message() {
        let err = GenerationError::ConfigNotFound(UseCase::ProductTags);
        assert_eq!(
            err.to_string(),
            "no active configuration for use case product_tags"
        );
        assert_eq!(err.kind(), "config_not_found");
    }

    #[test]
    fn test_dispatch_error_keeps_source_and_trace() {
        let err = GenerationError::dispatch(DispatchError::Timeout("30s".to_string()));
        assert_eq!(err.to_string(), "dispatch failed: request timed out: 30s");
        match err {
            GenerationError::Dispatch { source, trace } => {
                assert_eq!(source.kind(), "timeout");
                assert!(!trace.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
