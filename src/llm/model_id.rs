use crate::generation::Provider;

pub const OPENROUTER_PREFIX: &str = "openrouter/";
pub const GEMINI_PREFIX: &str = "gemini/";

/// Qualifies a configured model name with the routing prefix its provider
/// expects. Already-qualified names pass through, so the function is
/// idempotent.
pub fn normalize(provider: Provider, raw_model: &str) -> String {
    let prefix = match provider {
        Provider::OpenRouter => OPENROUTER_PREFIX,
        Provider::Google => GEMINI_PREFIX,
        Provider::OpenAi | Provider::Anthropic => return raw_model.to_string(),
    };

    if raw_model.starts_with(prefix) {
        raw_model.to_string()
    } else {
        format!("{prefix}{raw_model}")
    }
}

/// Reduces a provider-reported model id to its pricing key:
/// `openrouter/google/gemini-2.0-flash:free` becomes `gemini-2.0-flash`.
pub fn pricing_key(model: &str) -> &str {
    let base = model.rsplit('/').next().unwrap_or(model);
    base.split(':').next().unwrap_or(base)
}
