use std::sync::Arc;
use std::time::Instant;

use opentelemetry::KeyValue;
use rust_decimal::prelude::ToPrimitive;

use super::GenerationError;
use super::render::render;
use super::resolver::{ConfigResolver, ConfigStore};
use super::types::{GenerationContext, GenerationResult, UseCase};
use crate::llm::{DispatchClient, DispatchError, DispatchRequest, PricingTable, normalize};
use crate::telemetry::metrics::GEN_AI_COST;

/// Resolve, render, dispatch and price one generation. Performs no
/// persistence.
#[derive(Clone)]
pub struct Orchestrator {
    resolver: ConfigResolver,
    dispatch: Arc<dyn DispatchClient>,
    pricing: Arc<PricingTable>,
}

impl Orchestrator {
    pub fn new(
        configs: Arc<dyn ConfigStore>,
        dispatch: Arc<dyn DispatchClient>,
        pricing: Arc<PricingTable>,
    ) -> Self {
        Self {
            resolver: ConfigResolver::new(configs),
            dispatch,
            pricing,
        }
    }

    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    #[tracing::instrument(
        name = "generation.generate",
        skip(self, context),
        fields(
            use_case = %use_case,
            render.mode = tracing::field::Empty,
            gen_ai.request.model = tracing::field::Empty,
            gen_ai.response.model = tracing::field::Empty,
            gen_ai.usage.total_tokens = tracing::field::Empty,
            cost_usd = tracing::field::Empty,
        )
    )]
    pub async fn generate(
        &self,
        use_case: UseCase,
        context: &GenerationContext,
    ) -> Result<GenerationResult, GenerationError> {
        let config = self.resolver.resolve(use_case).await?;

        let rendered = render(&config, context);
        let requested_model = normalize(config.provider, &config.model);

        let span = tracing::Span::current();
        span.record("render.mode", tracing::field::debug(rendered.mode));
        span.record("gen_ai.request.model", requested_model.as_str());

        let request = DispatchRequest {
            model: requested_model.clone(),
            temperature: config.temperature as f32,
            max_tokens: u32::try_from(config.max_tokens).unwrap_or(0),
            system_prompt: rendered.system_prompt,
            user_prompt: rendered.user_prompt,
        };

        let start = Instant::now();
        let outcome = self.dispatch.complete(&request).await;
        let latency_ms = i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX);

        let response = outcome.map_err(GenerationError::dispatch)?;

        let content = response.text.trim();
        if content.is_empty() {
            return Err(GenerationError::dispatch(DispatchError::EmptyResponse));
        }

        let usage = response.usage.unwrap_or_default();
        let model_used = if response.model.is_empty() {
            requested_model.clone()
        } else {
            response.model.clone()
        };

        let cost_usd = self.pricing.calculate_cost(
            &model_used,
            usage.prompt_tokens,
            usage.completion_tokens,
        );

        span.record("gen_ai.response.model", model_used.as_str());
        span.record("gen_ai.usage.total_tokens", i64::from(usage.total_tokens));
        span.record("cost_usd", tracing::field::display(cost_usd));

        GEN_AI_COST.add(
            cost_usd.to_f64().unwrap_or(0.0),
            &[
                KeyValue::new("gen_ai.provider.name", config.provider.as_str()),
                KeyValue::new("gen_ai.request.model", requested_model.clone()),
                KeyValue::new("use_case", use_case.as_str()),
            ],
        );

        tracing::info!(
            use_case = %use_case,
            model = %model_used,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            cost_usd = %cost_usd,
            latency_ms,
            "Generation completed"
        );

        Ok(GenerationResult {
            content: content.to_string(),
            model_used,
            finish_reason: response.finish_reason,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            cost_usd,
            use_case,
            system_prompt: request.system_prompt,
            user_prompt: request.user_prompt,
            provider: config.provider,
            requested_model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            latency_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rust_decimal::Decimal;

    use super::*;
    use crate::db::memory::MemoryConfigStore;
    use crate::generation::types::{GenerationConfig, Provider};
    use crate::llm::{DispatchResponse, Usage};

    struct StubDispatch {
        calls: Mutex<Vec<DispatchRequest>>,
        reply: Result<DispatchResponse, DispatchError>,
    }

    impl StubDispatch {
        fn replying(text: &str, model: &str, usage: Option<Usage>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                reply: Ok(DispatchResponse {
                    text: text.to_string(),
                    model: model.to_string(),
                    finish_reason: "stop".to_string(),
                    usage,
                }),
            })
        }

        fn failing(err: DispatchError) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                reply: Err(err),
            })
        }

        fn calls(&self) -> Vec<DispatchRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl DispatchClient for StubDispatch {
        async fn complete(&self, req: &DispatchRequest) -> Result<DispatchResponse, DispatchError> {
            self.calls.lock().unwrap().push(req.clone());
            self.reply.clone()
        }
    }

    fn title_config() -> GenerationConfig {
        GenerationConfig::new(
            UseCase::PostSeoTitle,
            Provider::OpenRouter,
            "vendor-x/model-y",
            "Write a title.",
        )
        .with_user_prompt("Title for: {{title}}")
        .with_params(0.7, 100)
    }

    fn orchestrator(
        configs: Vec<GenerationConfig>,
        dispatch: Arc<StubDispatch>,
    ) -> Orchestrator {
        Orchestrator::new(
            Arc::new(MemoryConfigStore::with_configs(configs)),
            dispatch,
            Arc::new(PricingTable::builtin().unwrap()),
        )
    }

    #[tokio::test]
    async fn test_generate_clean_mode_dispatches_normalized_request() {
        let dispatch = StubDispatch::replying("  Top 10 Best Gifts \n", "vendor-x/model-y", None);
        let orch = orchestrator(vec![title_config()], dispatch.clone());

        let ctx = GenerationContext {
            title: Some("Best Gifts".to_string()),
            ..Default::default()
        };
        let result = orch.generate(UseCase::PostSeoTitle, &ctx).await.unwrap();

        let calls = dispatch.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "openrouter/vendor-x/model-y");
        assert_eq!(calls[0].temperature, 0.7);
        assert_eq!(calls[0].max_tokens, 100);
        assert_eq!(calls[0].system_prompt, "Write a title.");
        assert_eq!(calls[0].user_prompt, "Title for: Best Gifts");

        assert_eq!(result.content, "Top 10 Best Gifts");
        assert_eq!(result.user_prompt, "Title for: Best Gifts");
        assert_eq!(result.requested_model, "openrouter/vendor-x/model-y");
        assert_eq!(result.provider, Provider::OpenRouter);
        assert_eq!(result.use_case, UseCase::PostSeoTitle);
        assert_eq!(result.max_tokens, 100);
        assert!(result.latency_ms >= 0);
    }

    #[tokio::test]
    async fn test_generate_missing_title_renders_empty() {
        let dispatch = StubDispatch::replying("Title", "vendor-x/model-y", None);
        let orch = orchestrator(vec![title_config()], dispatch.clone());

        orch.generate(UseCase::PostSeoTitle, &GenerationContext::default())
            .await
            .unwrap();

        assert_eq!(dispatch.calls()[0].user_prompt, "Title for: ");
    }

    #[tokio::test]
    async fn test_generate_config_not_found_skips_dispatch() {
        let dispatch = StubDispatch::replying("unused", "gpt-4o-mini", None);
        let orch = orchestrator(vec![title_config()], dispatch.clone());

        let err = orch
            .generate(UseCase::ProductTags, &GenerationContext::default())
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::ConfigNotFound(UseCase::ProductTags)));
        assert!(dispatch.calls().is_empty());
    }

    #[tokio::test]
    async fn test_generate_cost_from_reported_usage() {
        let config = GenerationConfig::new(
            UseCase::ProductTags,
            Provider::OpenAi,
            "gpt-4o-mini",
            "Sugira tags.",
        )
        .with_user_prompt("{{product_name}}");
        let dispatch =
            StubDispatch::replying("geek, presentes", "gpt-4o-mini", Some(Usage::new(120, 40)));
        let orch = orchestrator(vec![config], dispatch);

        let result = orch
            .generate(UseCase::ProductTags, &GenerationContext::default())
            .await
            .unwrap();

        assert_eq!(result.prompt_tokens, 120);
        assert_eq!(result.completion_tokens, 40);
        assert_eq!(result.total_tokens, 160);
        assert_eq!(result.cost_usd, Decimal::new(42, 6));
    }

    #[tokio::test]
    async fn test_generate_prices_substituted_model() {
        let dispatch = StubDispatch::replying(
            "ok",
            "openai/gpt-4o:2024-08-06",
            Some(Usage::new(1_000_000, 0)),
        );
        let orch = orchestrator(vec![title_config()], dispatch);

        let result = orch
            .generate(UseCase::PostSeoTitle, &GenerationContext::default())
            .await
            .unwrap();

        assert_eq!(result.model_used, "openai/gpt-4o:2024-08-06");
        assert_eq!(result.cost_usd, Decimal::new(25, 1));
    }

    #[tokio::test]
    async fn test_generate_missing_usage_is_zero() {
        let dispatch = StubDispatch::replying("ok", "gpt-4o-mini", None);
        let orch = orchestrator(vec![title_config()], dispatch);

        let result = orch
            .generate(UseCase::PostSeoTitle, &GenerationContext::default())
            .await
            .unwrap();

        assert_eq!(result.prompt_tokens, 0);
        assert_eq!(result.completion_tokens, 0);
        assert_eq!(result.total_tokens, 0);
        assert_eq!(result.cost_usd, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_generate_empty_model_falls_back_to_requested() {
        let dispatch = StubDispatch::replying("ok", "", None);
        let orch = orchestrator(vec![title_config()], dispatch);

        let result = orch
            .generate(UseCase::PostSeoTitle, &GenerationContext::default())
            .await
            .unwrap();

        assert_eq!(result.model_used, "openrouter/vendor-x/model-y");
    }

    #[tokio::test]
    async fn test_generate_propagates_dispatch_error() {
        let dispatch = StubDispatch::failing(DispatchError::RateLimit("429".to_string()));
        let orch = orchestrator(vec![title_config()], dispatch.clone());

        let err = orch
            .generate(UseCase::PostSeoTitle, &GenerationContext::default())
            .await
            .unwrap_err();

        match err {
            GenerationError::Dispatch { source, .. } => {
                assert_eq!(source, DispatchError::RateLimit("429".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(dispatch.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_generate_blank_output_is_dispatch_error() {
        let dispatch = StubDispatch::replying("  \n ", "vendor-x/model-y", Some(Usage::new(10, 0)));
        let orch = orchestrator(vec![title_config()], dispatch);

        let err = orch
            .generate(UseCase::PostSeoTitle, &GenerationContext::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GenerationError::Dispatch {
                source: DispatchError::EmptyResponse,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_generate_legacy_config() {
        let config = GenerationConfig::new(
            UseCase::PostSeoDescription,
            Provider::Google,
            "gemini-2.0-flash",
            "TAREFA: Meta description.\n\nCONTEXTO DO POST:\n- Titulo: {{title}}\n\nREGRAS:\n- Max 160",
        );
        let dispatch = StubDispatch::replying("desc", "gemini-2.0-flash", Some(Usage::new(10, 5)));
        let orch = orchestrator(vec![config], dispatch.clone());

        let ctx = GenerationContext {
            title: Some("Presentes".to_string()),
            ..Default::default()
        };
        orch.generate(UseCase::PostSeoDescription, &ctx).await.unwrap();

        let call = &dispatch.calls()[0];
        assert_eq!(call.model, "gemini/gemini-2.0-flash");
        assert_eq!(call.system_prompt, "TAREFA: Meta description.\n\nREGRAS:\n- Max 160");
        assert_eq!(call.user_prompt, "Titulo: Presentes");
    }
}
