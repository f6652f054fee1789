use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of content a configuration produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "ai_use_case", rename_all = "snake_case")]
pub enum UseCase {
    SeoTitle,
    SeoDescription,
    SeoKeywords,

    PostSeoAll,
    PostSeoKeyword,
    PostSeoTitle,
    PostSeoDescription,
    PostTags,

    OccasionSeoAll,
    OccasionSeoKeyword,
    OccasionSeoTitle,
    OccasionSeoDescription,
    OccasionContent,
    OccasionTags,

    CategorySeoKeyword,
    CategorySeoTitle,
    CategorySeoDescription,
    CategoryTags,

    PostContent,
    ProductDescription,
    ProductTags,
    ProductInstagramHeadline,
    ProductInstagramBadge,
    ProductInstagramTitle,
    ProductInstagramHashtags,
    ProductInstagramCaption,
    ProductInstagramAll,

    SocialShare,
    Translation,
}

impl UseCase {
    pub const ALL: [UseCase; 29] = [
        UseCase::SeoTitle,
        UseCase::SeoDescription,
        UseCase::SeoKeywords,
        UseCase::PostSeoAll,
        UseCase::PostSeoKeyword,
        UseCase::PostSeoTitle,
        UseCase::PostSeoDescription,
        UseCase::PostTags,
        UseCase::OccasionSeoAll,
        UseCase::OccasionSeoKeyword,
        UseCase::OccasionSeoTitle,
        UseCase::OccasionSeoDescription,
        UseCase::OccasionContent,
        UseCase::OccasionTags,
        UseCase::CategorySeoKeyword,
        UseCase::CategorySeoTitle,
        UseCase::CategorySeoDescription,
        UseCase::CategoryTags,
        UseCase::PostContent,
        UseCase::ProductDescription,
        UseCase::ProductTags,
        UseCase::ProductInstagramHeadline,
        UseCase::ProductInstagramBadge,
        UseCase::ProductInstagramTitle,
        UseCase::ProductInstagramHashtags,
        UseCase::ProductInstagramCaption,
        UseCase::ProductInstagramAll,
        UseCase::SocialShare,
        UseCase::Translation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UseCase::SeoTitle => "seo_title",
            UseCase::SeoDescription => "seo_description",
            UseCase::SeoKeywords => "seo_keywords",
            UseCase::PostSeoAll => "post_seo_all",
            UseCase::PostSeoKeyword => "post_seo_keyword",
            UseCase::PostSeoTitle => "post_seo_title",
            UseCase::PostSeoDescription => "post_seo_description",
            UseCase::PostTags => "post_tags",
            UseCase::OccasionSeoAll => "occasion_seo_all",
            UseCase::OccasionSeoKeyword => "occasion_seo_keyword",
            UseCase::OccasionSeoTitle => "occasion_seo_title",
            UseCase::OccasionSeoDescription => "occasion_seo_description",
            UseCase::OccasionContent => "occasion_content",
            UseCase::OccasionTags => "occasion_tags",
            UseCase::CategorySeoKeyword => "category_seo_keyword",
            UseCase::CategorySeoTitle => "category_seo_title",
            UseCase::CategorySeoDescription => "category_seo_description",
            UseCase::CategoryTags => "category_tags",
            UseCase::PostContent => "post_content",
            UseCase::ProductDescription => "product_description",
            UseCase::ProductTags => "product_tags",
            UseCase::ProductInstagramHeadline => "product_instagram_headline",
            UseCase::ProductInstagramBadge => "product_instagram_badge",
            UseCase::ProductInstagramTitle => "product_instagram_title",
            UseCase::ProductInstagramHashtags => "product_instagram_hashtags",
            UseCase::ProductInstagramCaption => "product_instagram_caption",
            UseCase::ProductInstagramAll => "product_instagram_all",
            UseCase::SocialShare => "social_share",
            UseCase::Translation => "translation",
        }
    }

    /// Use cases whose output is a multi-field JSON bundle.
    pub fn expects_json(self) -> bool {
        matches!(
            self,
            UseCase::PostSeoAll | UseCase::OccasionSeoAll | UseCase::ProductInstagramAll
        )
    }

    /// Use cases whose output is a comma or newline separated list.
    pub fn yields_list(self) -> bool {
        matches!(
            self,
            UseCase::SeoKeywords
                | UseCase::PostTags
                | UseCase::OccasionTags
                | UseCase::CategoryTags
                | UseCase::ProductTags
        )
    }
}

impl fmt::Display for UseCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown use case: {0}")]
pub struct UnknownUseCase(pub String);

impl FromStr for UseCase {
    type Err = UnknownUseCase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UseCase::ALL
            .into_iter()
            .find(|u| u.as_str() == s)
            .ok_or_else(|| UnknownUseCase(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "ai_provider", rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Google,
    OpenRouter,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
            Provider::OpenRouter => "openrouter",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business entity a configuration is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "ai_entity", rename_all = "lowercase")]
pub enum Entity {
    Post,
    Category,
    Occasion,
    Product,
    General,
}

/// Operator-authored settings for one use case. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct GenerationConfig {
    pub id: Uuid,
    pub use_case: UseCase,
    pub name: String,
    pub description: Option<String>,
    pub entity: Entity,
    pub provider: Provider,
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: Option<String>,
    pub temperature: f64,
    pub max_tokens: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationConfig {
    pub fn new(
        use_case: UseCase,
        provider: Provider,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            use_case,
            name: use_case.as_str().to_string(),
            description: None,
            entity: Entity::General,
            provider,
            model: model.into(),
            system_prompt: system_prompt.into(),
            user_prompt: None,
            temperature: 0.7,
            max_tokens: 500,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_user_prompt(mut self, user_prompt: impl Into<String>) -> Self {
        self.user_prompt = Some(user_prompt.into());
        self
    }

    pub fn with_params(mut self, temperature: f64, max_tokens: i32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Per-call data available to prompt templates. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    /// Additional named values for custom `{{placeholders}}`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// Outcome of one successful generation, including what was actually sent.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    pub content: String,
    pub model_used: String,
    pub finish_reason: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub cost_usd: Decimal,
    pub use_case: UseCase,

    pub system_prompt: String,
    pub user_prompt: String,
    pub provider: Provider,
    pub requested_model: String,
    pub temperature: f64,
    pub max_tokens: i32,
    pub latency_ms: i64,
}
