use std::sync::Arc;
use std::time::Instant;

use opentelemetry::KeyValue;
use tracing::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::anthropic::AnthropicBackend;
use super::model_id::{GEMINI_PREFIX, OPENROUTER_PREFIX};
use super::openai::OpenAiCompatibleBackend;
use super::{DispatchClient, DispatchError, DispatchRequest, DispatchResponse};
use crate::config::Config;
use crate::telemetry::metrics::{GEN_AI_ERROR_COUNT, GEN_AI_OPERATION_DURATION, GEN_AI_TOKEN_USAGE};

const ANTHROPIC_PREFIX: &str = "anthropic/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    OpenAi,
    Anthropic,
    Google,
    OpenRouter,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::OpenAi => "openai",
            Backend::Anthropic => "anthropic",
            Backend::Google => "google",
            Backend::OpenRouter => "openrouter",
        }
    }

    fn server_address(self) -> &'static str {
        match self {
            Backend::OpenAi => "api.openai.com",
            Backend::Anthropic => "api.anthropic.com",
            Backend::Google => "generativelanguage.googleapis.com",
            Backend::OpenRouter => "openrouter.ai",
        }
    }
}

/// Picks the backend for a normalized model id and returns the model name
/// that backend expects on the wire.
pub fn route(model: &str) -> (Backend, &str) {
    if let Some(rest) = model.strip_prefix(OPENROUTER_PREFIX) {
        (Backend::OpenRouter, rest)
    } else if let Some(rest) = model.strip_prefix(GEMINI_PREFIX) {
        (Backend::Google, rest)
    } else if let Some(rest) = model.strip_prefix(ANTHROPIC_PREFIX) {
        (Backend::Anthropic, rest)
    } else if model.starts_with("claude") {
        (Backend::Anthropic, model)
    } else {
        (Backend::OpenAi, model)
    }
}

/// Dispatch client over every configured provider backend. Makes exactly
/// one attempt per call.
#[derive(Default)]
pub struct ProviderRouter {
    openai: Option<Arc<dyn DispatchClient>>,
    anthropic: Option<Arc<dyn DispatchClient>>,
    google: Option<Arc<dyn DispatchClient>>,
    openrouter: Option<Arc<dyn DispatchClient>>,
}

impl ProviderRouter {
    pub fn from_config(config: &Config) -> Self {
        let mut router = Self::default();

        if let Some(key) = config.openai_api_key.as_deref() {
            router = router.with_backend(Backend::OpenAi, Arc::new(OpenAiCompatibleBackend::new(key)));
        }
        if let Some(key) = config.anthropic_api_key.as_deref() {
            router = router.with_backend(Backend::Anthropic, Arc::new(AnthropicBackend::new(key)));
        }
        if let Some(key) = config.google_api_key.as_deref() {
            router = router.with_backend(
                Backend::Google,
                Arc::new(OpenAiCompatibleBackend::new_google(key)),
            );
        }
        if let Some(key) = config.openrouter_api_key.as_deref() {
            router = router.with_backend(
                Backend::OpenRouter,
                Arc::new(OpenAiCompatibleBackend::new_openrouter(
                    key,
                    &config.openrouter_base_url,
                )),
            );
        }

        tracing::info!(backends = ?router.configured(), "Provider router initialized");

        router
    }

    pub fn with_backend(mut self, backend: Backend, client: Arc<dyn DispatchClient>) -> Self {
        let slot = match backend {
            Backend::OpenAi => &mut self.openai,
            Backend::Anthropic => &mut self.anthropic,
            Backend::Google => &mut self.google,
            Backend::OpenRouter => &mut self.openrouter,
        };
        *slot = Some(client);
        self
    }

    pub fn configured(&self) -> Vec<&'static str> {
        [
            (Backend::OpenAi, &self.openai),
            (Backend::Anthropic, &self.anthropic),
            (Backend::Google, &self.google),
            (Backend::OpenRouter, &self.openrouter),
        ]
        .into_iter()
        .filter(|(_, client)| client.is_some())
        .map(|(backend, _)| backend.as_str())
        .collect()
    }

    fn backend(&self, backend: Backend) -> Option<&Arc<dyn DispatchClient>> {
        match backend {
            Backend::OpenAi => self.openai.as_ref(),
            Backend::Anthropic => self.anthropic.as_ref(),
            Backend::Google => self.google.as_ref(),
            Backend::OpenRouter => self.openrouter.as_ref(),
        }
    }
}

#[async_trait::async_trait]
impl DispatchClient for ProviderRouter {
    async fn complete(&self, req: &DispatchRequest) -> Result<DispatchResponse, DispatchError> {
        let (backend, wire_model) = route(&req.model);
        let provider_name = backend.as_str();

        let client = self.backend(backend).ok_or_else(|| {
            DispatchError::Auth(format!("no API key configured for provider {provider_name}"))
        })?;

        let span = tracing::info_span!(
            "gen_ai.chat",
            otel.name = %format!("gen_ai.chat {wire_model}"),
            gen_ai.operation.name = "chat",
            gen_ai.provider.name = %provider_name,
            gen_ai.request.model = %wire_model,
            server.address = %backend.server_address(),
            server.port = 443_i64,
            gen_ai.request.temperature = req.temperature,
            gen_ai.request.max_tokens = req.max_tokens as i64,
            gen_ai.response.model = tracing::field::Empty,
            gen_ai.usage.input_tokens = tracing::field::Empty,
            gen_ai.usage.output_tokens = tracing::field::Empty,
            gen_ai.response.finish_reasons = tracing::field::Empty,
            otel.status_code = tracing::field::Empty,
            error.type = tracing::field::Empty,
        );

        {
            let mut user_event_attrs =
                vec![KeyValue::new("gen_ai.prompt", truncate(&req.user_prompt, 1000))];
            if !req.system_prompt.is_empty() {
                user_event_attrs.push(KeyValue::new(
                    "gen_ai.system_instructions",
                    truncate(&req.system_prompt, 500),
                ));
            }
            span.add_event("gen_ai.user.message", user_event_attrs);
        }

        let wire_req = DispatchRequest {
            model: wire_model.to_string(),
            ..req.clone()
        };

        let start = Instant::now();
        let result = client.complete(&wire_req).instrument(span.clone()).await;
        let duration = start.elapsed().as_secs_f64();

        let provider_kv = KeyValue::new("gen_ai.provider.name", provider_name);

        match result {
            Ok(resp) => {
                span.record("gen_ai.response.model", resp.model.as_str());
                if !resp.finish_reason.is_empty() {
                    span.record("gen_ai.response.finish_reasons", resp.finish_reason.as_str());
                }

                let op_kv = KeyValue::new("gen_ai.operation.name", "chat");
                let model_kv = KeyValue::new("gen_ai.request.model", wire_model.to_string());

                if let Some(usage) = resp.usage {
                    span.record("gen_ai.usage.input_tokens", usage.prompt_tokens as i64);
                    span.record("gen_ai.usage.output_tokens", usage.completion_tokens as i64);

                    GEN_AI_TOKEN_USAGE.record(
                        f64::from(usage.prompt_tokens),
                        &[
                            KeyValue::new("gen_ai.token.type", "input"),
                            op_kv.clone(),
                            provider_kv.clone(),
                            model_kv.clone(),
                        ],
                    );
                    GEN_AI_TOKEN_USAGE.record(
                        f64::from(usage.completion_tokens),
                        &[
                            KeyValue::new("gen_ai.token.type", "output"),
                            op_kv.clone(),
                            provider_kv.clone(),
                            model_kv.clone(),
                        ],
                    );
                }

                span.add_event(
                    "gen_ai.assistant.message",
                    vec![KeyValue::new("gen_ai.completion", truncate(&resp.text, 2000))],
                );

                GEN_AI_OPERATION_DURATION.record(duration, &[op_kv, provider_kv, model_kv]);

                Ok(resp)
            }
            Err(err) => {
                span.record("otel.status_code", "ERROR");
                span.record("error.type", err.kind());

                GEN_AI_ERROR_COUNT.add(
                    1,
                    &[
                        provider_kv,
                        KeyValue::new("gen_ai.request.model", wire_model.to_string()),
                        KeyValue::new("error.type", err.kind()),
                    ],
                );

                tracing::warn!(
                    provider = provider_name,
                    model = %wire_model,
                    error = %err,
                    "LLM call failed"
                );

                Err(err)
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        s.char_indices()
            .take_while(|&(i, _)| i < max)
            .map(|(_, c)| c)
            .collect()
    }
}
