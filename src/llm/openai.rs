use async_openai::{
    Client,
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
    },
};

use super::{DispatchClient, DispatchError, DispatchRequest, DispatchResponse, Usage};

const GOOGLE_OPENAI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Any backend speaking the OpenAI chat-completions protocol: OpenAI itself,
/// OpenRouter and Google's compatibility endpoint.
pub struct OpenAiCompatibleBackend {
    client: Client<OpenAIConfig>,
    name: &'static str,
}

impl OpenAiCompatibleBackend {
    pub fn new(api_key: &str) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Client::with_config(config),
            name: "openai",
        }
    }

    pub fn new_google(api_key: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(GOOGLE_OPENAI_BASE);
        Self {
            client: Client::with_config(config),
            name: "google",
        }
    }

    pub fn new_openrouter(api_key: &str, base_url: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url.trim_end_matches('/'));
        Self {
            client: Client::with_config(config),
            name: "openrouter",
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[async_trait::async_trait]
impl DispatchClient for OpenAiCompatibleBackend {
    async fn complete(&self, req: &DispatchRequest) -> Result<DispatchResponse, DispatchError> {
        let mut messages = Vec::with_capacity(2);
        if !req.system_prompt.is_empty() {
            messages.push(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(
                        req.system_prompt.clone(),
                    ),
                    name: None,
                },
            ));
        }
        messages.push(ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(req.user_prompt.clone()),
                name: None,
            },
        ));

        #[allow(deprecated)]
        let request = CreateChatCompletionRequest {
            model: req.model.clone(),
            messages,
            temperature: Some(req.temperature),
            max_completion_tokens: Some(req.max_tokens),
            ..Default::default()
        };

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| DispatchError::classify(format!("{} API error: {e}", self.name)))?;

        let choice = response.choices.first();

        let text = choice
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        let finish_reason = choice
            .and_then(|c| c.finish_reason)
            .map(|r| format!("{r:?}").to_lowercase())
            .unwrap_or_default();

        let usage = response.usage.as_ref().map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(DispatchResponse {
            text,
            model: response.model,
            finish_reason,
            usage,
        })
    }
}
