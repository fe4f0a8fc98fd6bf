// Reasoning / thinking configuration per model family
//
// Each provider exposes a different knob for eliciting streamed reasoning.
// The resolver maps (provider family, model name) to the semantic
// parameters; drivers translate them to the wire.

use serde::Serialize;

/// Upstream LLM vendor family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Google,
    OpenAi,
    Anthropic,
    Xai,
    VertexAi,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Xai => "xai",
            ProviderKind::VertexAi => "vertexai",
        }
    }

    /// Every supported provider value, in the order shown in errors.
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Xai,
        ProviderKind::Google,
        ProviderKind::VertexAi,
    ];
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(ProviderKind::Google),
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "xai" => Ok(ProviderKind::Xai),
            "vertexai" => Ok(ProviderKind::VertexAi),
            other => Err(format!("unsupported provider '{other}'")),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gemini thinking depth for models without an explicit token budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThinkingLevel {
    High,
}

/// Reasoning effort for OpenAI-protocol providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    High,
}

/// Reasoning summary mode for the OpenAI Responses API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningSummary {
    Auto,
}

/// Resolved reasoning parameters for one (provider, model) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningConfig {
    /// Gemini models with a fixed thinking-token budget.
    GeminiBudget {
        thinking_budget: u32,
        include_thoughts: bool,
    },
    /// Other Gemini models: level-based thinking.
    GeminiLevel {
        level: ThinkingLevel,
        include_thoughts: bool,
    },
    /// OpenAI reasoning models via the Responses API.
    OpenAiResponses {
        effort: ReasoningEffort,
        summary: ReasoningSummary,
    },
    /// Claude extended thinking. `budget_tokens` must stay below
    /// `max_tokens`.
    AnthropicThinking {
        budget_tokens: u32,
        max_tokens: u32,
    },
    /// xAI Grok reasoning effort.
    XaiEffort { effort: ReasoningEffort },
    /// Model family does not stream reasoning.
    Disabled,
}

/// Pick the reasoning configuration for a model.
///
/// Vertex-hosted models resolve by the underlying family: claude models get
/// the Anthropic config, everything else the Gemini config.
pub fn resolve_reasoning(provider: ProviderKind, model: &str) -> ReasoningConfig {
    let model_lower = model.to_lowercase();
    match provider {
        ProviderKind::Google => gemini_config(&model_lower),
        ProviderKind::VertexAi => {
            if model_lower.contains("claude") || model_lower.contains("anthropic") {
                anthropic_config()
            } else {
                gemini_config(&model_lower)
            }
        }
        ProviderKind::OpenAi => {
            if model_lower.starts_with("gpt-5")
                && (model_lower.contains("-chat") || model_lower.contains("-main"))
            {
                ReasoningConfig::Disabled
            } else {
                ReasoningConfig::OpenAiResponses {
                    effort: ReasoningEffort::High,
                    summary: ReasoningSummary::Auto,
                }
            }
        }
        ProviderKind::Anthropic => anthropic_config(),
        ProviderKind::Xai => {
            if ["non-reasoning", "code", "imagine"]
                .iter()
                .any(|tag| model_lower.contains(tag))
            {
                ReasoningConfig::Disabled
            } else {
                ReasoningConfig::XaiEffort {
                    effort: ReasoningEffort::High,
                }
            }
        }
    }
}

fn gemini_config(model_lower: &str) -> ReasoningConfig {
    if model_lower.contains("gemini-2.5-pro") {
        ReasoningConfig::GeminiBudget {
            thinking_budget: 32768,
            include_thoughts: true,
        }
    } else if model_lower.contains("gemini-2.5-flash") {
        ReasoningConfig::GeminiBudget {
            thinking_budget: 24576,
            include_thoughts: true,
        }
    } else {
        ReasoningConfig::GeminiLevel {
            level: ThinkingLevel::High,
            include_thoughts: true,
        }
    }
}

fn anthropic_config() -> ReasoningConfig {
    ReasoningConfig::AnthropicThinking {
        budget_tokens: 16000,
        max_tokens: 32000,
    }
}
