//! Core data models for translation

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Chat identifier; stored on disk in its string form
pub type ChatId = i64;

/// Remote API family an engine speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineFamily {
    /// `/chat/completions` style APIs
    OpenAiCompatible,
    /// Anthropic messages API
    Claude,
    /// Google generateContent API
    Gemini,
}

impl fmt::Display for EngineFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineFamily::OpenAiCompatible => write!(f, "openai-compatible"),
            EngineFamily::Claude => write!(f, "claude"),
            EngineFamily::Gemini => write!(f, "gemini"),
        }
    }
}

/// Supported translation engines, in catalog order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    DeepSeek,
    OpenAi,
    Claude,
    Gemini,
    Groq,
    Mistral,
}

impl Engine {
    /// All engines in catalog order
    pub const ALL: [Engine; 6] = [
        Engine::DeepSeek,
        Engine::OpenAi,
        Engine::Claude,
        Engine::Gemini,
        Engine::Groq,
        Engine::Mistral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::DeepSeek => "deepseek",
            Engine::OpenAi => "openai",
            Engine::Claude => "claude",
            Engine::Gemini => "gemini",
            Engine::Groq => "groq",
            Engine::Mistral => "mistral",
        }
    }

    pub fn family(&self) -> EngineFamily {
        match self {
            Engine::Claude => EngineFamily::Claude,
            Engine::Gemini => EngineFamily::Gemini,
            _ => EngineFamily::OpenAiCompatible,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Engine::DeepSeek => "deepseek-chat",
            Engine::OpenAi => "gpt-4o-mini",
            Engine::Claude => "claude-sonnet-4-20250514",
            Engine::Gemini => "gemini-2.0-flash",
            Engine::Groq => "llama-3.3-70b-versatile",
            Engine::Mistral => "mistral-small-latest",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Engine::DeepSeek => "https://api.deepseek.com/v1",
            Engine::OpenAi => "https://api.openai.com/v1",
            Engine::Claude => "https://api.anthropic.com/v1",
            Engine::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Engine::Groq => "https://api.groq.com/openai/v1",
            Engine::Mistral => "https://api.mistral.ai/v1",
        }
    }

    /// Environment variable holding this engine's API key
    pub fn api_key_var(&self) -> String {
        format!("{}_API_KEY", self.as_str().to_uppercase())
    }

    /// Environment variable overriding this engine's base URL
    pub fn base_url_var(&self) -> String {
        format!("{}_BASE_URL", self.as_str().to_uppercase())
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        Engine::ALL
            .iter()
            .copied()
            .find(|e| e.as_str() == name)
            .ok_or_else(|| {
                format!(
                    "unsupported engine: {} (expected one of: {})",
                    s,
                    Engine::ALL.map(|e| e.as_str()).join(", ")
                )
            })
    }
}

/// Translation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub text: String,
    pub target_lang: String,
    pub source_lang: String,
    pub preferred_engine: String,
    /// Model override, applied to the preferred engine only
    pub model: Option<String>,
}

impl TranslationRequest {
    pub fn new(
        text: impl Into<String>,
        target_lang: impl Into<String>,
        preferred_engine: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            target_lang: target_lang.into(),
            source_lang: "auto".to_string(),
            preferred_engine: preferred_engine.into().trim().to_lowercase(),
            model: None,
        }
    }

    pub fn with_source_lang(mut self, source_lang: impl Into<String>) -> Self {
        self.source_lang = source_lang.into();
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model.filter(|m| !m.trim().is_empty());
        self
    }
}

/// What a provider hands back before orchestration adds bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderReply {
    pub detected_lang: String,
    pub translation: String,
}

/// Translation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub translation: String,
    pub detected_lang: String,
    /// May differ from the requested target after a same-language switch
    pub target_lang: String,
    pub engine: String,
    pub latency_seconds: f64,
}

/// Sparse per-chat options; absent keys fall back to global defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_translate: Option<bool>,
    /// Keys written by other tools are carried through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChatConfig {
    /// Overlay every key present in `patch`
    pub fn merge(&mut self, patch: ChatConfig) {
        if patch.provider.is_some() {
            self.provider = patch.provider;
        }
        if patch.target_lang.is_some() {
            self.target_lang = patch.target_lang;
        }
        if patch.model.is_some() {
            self.model = patch.model;
        }
        if patch.auto_translate.is_some() {
            self.auto_translate = patch.auto_translate;
        }
        self.extra.extend(patch.extra);
    }

    pub fn is_empty(&self) -> bool {
        self.provider.is_none()
            && self.target_lang.is_none()
            && self.model.is_none()
            && self.auto_translate.is_none()
            && self.extra.is_empty()
    }
}

/// Per-chat usage counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatStats {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub success: u64,
    #[serde(default)]
    pub fail: u64,
    #[serde(default)]
    pub chars: u64,
    #[serde(default)]
    pub providers: BTreeMap<String, u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_use: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_use: Option<f64>,
}

impl ChatStats {
    /// Success percentage, `None` before the first translation
    pub fn success_rate(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.success as f64 / self.total as f64 * 100.0)
        }
    }

    /// Engine with the highest count; ties resolve to the first name
    pub fn top_engine(&self) -> Option<&str> {
        let mut best: Option<(&str, u64)> = None;
        for (name, &count) in &self.providers {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((name.as_str(), count));
            }
        }
        best.map(|(name, _)| name)
    }
}

/// Totals across every chat
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub total_translations: u64,
    pub total_chars: u64,
    pub total_chats: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_round_trip_names() {
        for engine in Engine::ALL {
            assert_eq!(engine.as_str().parse::<Engine>().unwrap(), engine);
        }
        assert_eq!(" Claude ".parse::<Engine>().unwrap(), Engine::Claude);
        assert!("bing".parse::<Engine>().is_err());
        assert_eq!(Engine::Groq.family(), EngineFamily::OpenAiCompatible);
        assert_eq!(Engine::Gemini.default_model(), "gemini-2.0-flash");
        assert_eq!(Engine::DeepSeek.api_key_var(), "DEEPSEEK_API_KEY");
    }

    #[test]
    fn test_chat_config_merge_keeps_untouched_keys() {
        let mut cfg = ChatConfig {
            provider: Some("claude".to_string()),
            target_lang: Some("中文".to_string()),
            ..Default::default()
        };
        cfg.merge(ChatConfig {
            target_lang: Some("English".to_string()),
            ..Default::default()
        });
        assert_eq!(cfg.provider.as_deref(), Some("claude"));
        assert_eq!(cfg.target_lang.as_deref(), Some("English"));
    }

    #[test]
    fn test_chat_config_preserves_unknown_keys() {
        let raw = r#"{"provider":"gemini","theme":"dark"}"#;
        let cfg: ChatConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.extra.get("theme").and_then(|v| v.as_str()), Some("dark"));
        let back = serde_json::to_value(&cfg).unwrap();
        assert_eq!(back, serde_json::json!({"provider": "gemini", "theme": "dark"}));
    }

    #[test]
    fn test_stats_derived_views() {
        let mut stats = ChatStats::default();
        assert_eq!(stats.success_rate(), None);
        assert_eq!(stats.top_engine(), None);

        stats.total = 4;
        stats.success = 3;
        stats.providers.insert("claude".to_string(), 1);
        stats.providers.insert("openai".to_string(), 3);
        assert_eq!(stats.success_rate(), Some(75.0));
        assert_eq!(stats.top_engine(), Some("openai"));
    }
}
