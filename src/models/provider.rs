//! Provider and model catalog.
//!
//! Each model carries a capability descriptor that decides, once per
//! message, how reasoning text is separated from the answer.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Where a model delivers its intermediate reasoning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReasoningChannel {
    /// No reasoning channel
    #[default]
    None,
    /// Reasoning is interleaved in the answer text between `<tag>` and `</tag>`
    Delimited { tag: String },
    /// Reasoning arrives as separate stream parts
    Structured,
}

/// Capability descriptor resolved for a provider/model pair.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModelCapability {
    pub supports_reasoning: bool,
    pub reasoning_channel: ReasoningChannel,
}

impl ModelCapability {
    fn plain() -> Self {
        Self::default()
    }

    fn structured() -> Self {
        Self {
            supports_reasoning: true,
            reasoning_channel: ReasoningChannel::Structured,
        }
    }

    fn delimited(tag: &str) -> Self {
        Self {
            supports_reasoning: true,
            reasoning_channel: ReasoningChannel::Delimited {
                tag: tag.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub is_default: bool,
    pub capability: ModelCapability,
}

#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub id: &'static str,
    pub name: &'static str,
    /// Environment variable the hosted endpoint needs for this provider
    pub api_key_env: &'static str,
    pub models: Vec<ModelInfo>,
}

impl ProviderInfo {
    pub fn default_model(&self) -> Option<&ModelInfo> {
        self.models
            .iter()
            .find(|m| m.is_default)
            .or_else(|| self.models.first())
    }

    pub fn model(&self, model_id: &str) -> Option<&ModelInfo> {
        self.models.iter().find(|m| m.id == model_id)
    }
}

fn model(id: &'static str, name: &'static str, capability: ModelCapability) -> ModelInfo {
    ModelInfo {
        id,
        name,
        is_default: false,
        capability,
    }
}

fn default_model(id: &'static str, name: &'static str, capability: ModelCapability) -> ModelInfo {
    ModelInfo {
        is_default: true,
        ..model(id, name, capability)
    }
}

static PROVIDERS: Lazy<Vec<ProviderInfo>> = Lazy::new(|| {
    use ModelCapability as C;
    vec![
        ProviderInfo {
            id: "google",
            name: "Google",
            api_key_env: "GOOGLE_GENERATIVE_AI_API_KEY",
            models: vec![
                default_model("gemini-1.5-flash", "Gemini 1.5 Flash", C::plain()),
                model("gemini-1.0-pro", "Gemini 1.0 Pro", C::plain()),
                model("gemini-pro", "Gemini Pro", C::plain()),
                model("gemini-2.0-flash", "Gemini 2.0 Flash", C::plain()),
                model("gemini-2.0-flash-lite", "Gemini 2.0 Flash Lite", C::plain()),
                model("gemini-2.5-flash", "Gemini 2.5 Flash", C::plain()),
                model(
                    "gemini-2.5-flash-lite-preview-06-17",
                    "Gemini 2.5 Flash Lite (Thinking)",
                    C::structured(),
                ),
                model("gemini-2.5-pro", "Gemini 2.5 Pro", C::plain()),
            ],
        },
        ProviderInfo {
            id: "openai",
            name: "OpenAI",
            api_key_env: "OPENAI_API_KEY",
            models: vec![
                default_model("gpt-4-turbo-preview", "GPT-4 Turbo", C::plain()),
                model("gpt-4", "GPT-4", C::plain()),
                model("gpt-3.5-turbo", "GPT-3.5 Turbo", C::plain()),
                model("o1-mini", "O1 Mini (Reasoning)", C::structured()),
                model("o3-mini", "O3 Mini (Reasoning)", C::structured()),
                model("o4-mini", "O4 Mini (Reasoning)", C::structured()),
                model("gpt-4.1", "GPT-4.1", C::plain()),
                model("gpt-4.1-mini", "GPT-4.1 Mini", C::plain()),
                model("gpt-4.1-nano", "GPT-4.1 Nano", C::plain()),
            ],
        },
        ProviderInfo {
            id: "anthropic",
            name: "Anthropic",
            api_key_env: "ANTHROPIC_API_KEY",
            models: vec![
                default_model("claude-opus-4-20250514", "Claude Opus 4", C::structured()),
                model("claude-sonnet-4-20250514", "Claude Sonnet 4", C::structured()),
                model("claude-3-7-sonnet-20250219", "Claude Sonnet 3.7", C::structured()),
                model("claude-3-5-sonnet-20241022", "Claude Sonnet 3.5 v2", C::plain()),
                model("claude-3-5-haiku-20241022", "Claude Haiku 3.5", C::plain()),
                model("claude-3-opus-20240229", "Claude Opus 3", C::plain()),
                model("claude-3-haiku-20240307", "Claude Haiku 3", C::plain()),
            ],
        },
        ProviderInfo {
            id: "deepseek",
            name: "DeepSeek",
            api_key_env: "DEEPSEEK_API_KEY",
            models: vec![
                default_model("deepseek-v3-fireworks", "DeepSeek v3 (Fireworks)", C::plain()),
                model("deepseek-v3-0324", "DeepSeek v3 (0324)", C::plain()),
                model("deepseek-r1-openrouter", "DeepSeek R1 (OpenRouter)", C::delimited("think")),
                model("deepseek-r1-0528", "DeepSeek R1 (0528)", C::delimited("think")),
                model(
                    "deepseek-r1-llama-distilled",
                    "DeepSeek R1 (Llama Distilled)",
                    C::delimited("think"),
                ),
                model(
                    "deepseek-r1-qwen-distilled",
                    "DeepSeek R1 (Qwen Distilled)",
                    C::delimited("think"),
                ),
            ],
        },
    ]
});

/// All known providers.
pub fn providers() -> &'static [ProviderInfo] {
    &PROVIDERS
}

pub fn provider(provider_id: &str) -> Option<&'static ProviderInfo> {
    PROVIDERS.iter().find(|p| p.id == provider_id)
}

/// Capability of a provider/model pair. Unknown pairs have no reasoning channel.
pub fn capability(provider_id: &str, model_id: &str) -> ModelCapability {
    provider(provider_id)
        .and_then(|p| p.model(model_id))
        .map(|m| m.capability.clone())
        .unwrap_or_default()
}

/// Display name for a model, falling back to its id.
pub fn model_display_name(provider_id: &str, model_id: &str) -> String {
    provider(provider_id)
        .and_then(|p| p.model(model_id))
        .map(|m| m.name.to_string())
        .unwrap_or_else(|| model_id.to_string())
}

/// The provider's default model id, if the provider is known.
pub fn default_model_for(provider_id: &str) -> Option<&'static str> {
    provider(provider_id)
        .and_then(|p| p.default_model())
        .map(|m| m.id)
}
