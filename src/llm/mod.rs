pub mod anthropic;
pub mod model_id;
pub mod openai;
pub mod pricing;
pub mod router;

pub use model_id::normalize;
pub use pricing::{DEFAULT_PRICE, Price, PricingTable};
pub use router::ProviderRouter;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRequest {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub user_prompt: String,
}

/// Token usage as reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResponse {
    pub text: String,
    /// Model id the provider reports having used. May differ from the
    /// requested one when the provider substitutes a model.
    pub model: String,
    pub finish_reason: String,
    pub usage: Option<Usage>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limited: {0}")]
    RateLimit(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("provider server error: {0}")]
    Server(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("provider returned no content")]
    EmptyResponse,

    #[error("provider call failed: {0}")]
    Unknown(String),
}

impl DispatchError {
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Auth(_) => "auth_error",
            DispatchError::RateLimit(_) => "rate_limit",
            DispatchError::Timeout(_) => "timeout",
            DispatchError::InvalidRequest(_) => "invalid_request",
            DispatchError::Server(_) => "server_error",
            DispatchError::Network(_) => "network_error",
            DispatchError::MalformedResponse(_) => "malformed_response",
            DispatchError::EmptyResponse => "empty_response",
            DispatchError::Unknown(_) => "unknown_error",
        }
    }

    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = format!("{status}: {}", message.into());
        match status {
            401 | 403 => DispatchError::Auth(message),
            408 | 504 => DispatchError::Timeout(message),
            429 => DispatchError::RateLimit(message),
            400 | 404 | 413 | 422 => DispatchError::InvalidRequest(message),
            500..=599 => DispatchError::Server(message),
            _ => DispatchError::Unknown(message),
        }
    }

    /// Classifies a free-form provider or transport message.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let msg = message.to_lowercase();
        if msg.contains("rate limit") || msg.contains("429") {
            DispatchError::RateLimit(message)
        } else if msg.contains("timeout") || msg.contains("timed out") || msg.contains("deadline") {
            DispatchError::Timeout(message)
        } else if msg.contains("401")
            || msg.contains("403")
            || msg.contains("auth")
            || msg.contains("api key")
        {
            DispatchError::Auth(message)
        } else if msg.contains("400") || msg.contains("422") || msg.contains("invalid") {
            DispatchError::InvalidRequest(message)
        } else if msg.contains("500")
            || msg.contains("502")
            || msg.contains("503")
            || msg.contains("server")
        {
            DispatchError::Server(message)
        } else if msg.contains("connect")
            || msg.contains("dns")
            || msg.contains("network")
            || msg.contains("reset")
        {
            DispatchError::Network(message)
        } else if msg.contains("deserialize") || msg.contains("parse") || msg.contains("json") {
            DispatchError::MalformedResponse(message)
        } else {
            DispatchError::Unknown(message)
        }
    }
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DispatchError::Timeout(err.to_string())
        } else if err.is_decode() {
            DispatchError::MalformedResponse(err.to_string())
        } else if err.is_connect() {
            DispatchError::Network(err.to_string())
        } else if let Some(status) = err.status() {
            DispatchError::from_status(status.as_u16(), err.to_string())
        } else {
            DispatchError::classify(err.to_string())
        }
    }
}

/// One completion call against an external model provider.
#[async_trait::async_trait]
pub trait DispatchClient: Send + Sync {
    async fn complete(&self, req: &DispatchRequest) -> Result<DispatchResponse, DispatchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_error_categories() {
        let cases = vec![
            ("rate limit exceeded", "rate_limit"),
            ("status 429: too many requests", "rate_limit"),
            ("context deadline exceeded: timeout", "timeout"),
            ("request timed out", "timeout"),
            ("401 unauthorized", "auth_error"),
            ("403 forbidden", "auth_error"),
            ("authentication failed", "auth_error"),
            ("invalid api key", "auth_error"),
            ("400 bad request", "invalid_request"),
            ("422 unprocessable entity", "invalid_request"),
            ("invalid model name", "invalid_request"),
            ("500 internal server error", "server_error"),
            ("502 bad gateway", "server_error"),
            ("503 service unavailable", "server_error"),
            ("connection refused", "network_error"),
            ("dns resolution failed", "network_error"),
            ("connection reset by peer", "network_error"),
            ("failed to deserialize api response", "malformed_response"),
            ("something unexpected", "unknown_error"),
        ];

        for (msg, expected) in cases {
            assert_eq!(
                DispatchError::classify(msg).kind(),
                expected,
                "classify({msg:?}) should be {expected:?}"
            );
        }
    }

    #[test]
    fn test_classify_keeps_original_message() {
        let err = DispatchError::classify("Rate limit reached for gpt-4o-mini");
        assert_eq!(
            err,
            DispatchError::RateLimit("Rate limit reached for gpt-4o-mini".to_string())
        );
    }

    #[test]
    fn test_from_status() {
        assert_eq!(DispatchError::from_status(401, "bad key").kind(), "auth_error");
        assert_eq!(DispatchError::from_status(429, "slow down").kind(), "rate_limit");
        assert_eq!(DispatchError::from_status(504, "gateway").kind(), "timeout");
        assert_eq!(DispatchError::from_status(422, "bad").kind(), "invalid_request");
        assert_eq!(DispatchError::from_status(529, "overloaded").kind(), "server_error");
        assert_eq!(DispatchError::from_status(302, "moved").kind(), "unknown_error");
    }

    #[test]
    fn test_from_status_message_includes_status() {
        let err = DispatchError::from_status(503, "overloaded");
        assert_eq!(err.to_string(), "provider server error: 503: overloaded");
    }

    #[test]
    fn test_usage_new_totals() {
        let usage = Usage::new(120, 40);
        assert_eq!(usage.total_tokens, 160);
        assert_eq!(Usage::default().total_tokens, 0);
    }

    #[test]
    fn test_usage_new_saturates() {
        let usage = Usage::new(u32::MAX, 10);
        assert_eq!(usage.total_tokens, u32::MAX);
        assert_eq!(usage.completion_tokens, 10);
    }
}
