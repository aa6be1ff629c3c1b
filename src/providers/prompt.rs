//! Prompt construction and defensive response parsing shared by every provider

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::core::models::ProviderReply;

/// Placeholder when the model did not name the source language
pub const UNKNOWN_LANG: &str = "unknown";

static FENCE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```(?:json)?\s*").unwrap());
static FENCE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*```$").unwrap());
static EMBEDDED_OBJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)\{[^{}]*"translation"\s*:\s*"(?:[^"\\]|\\.)*"[^{}]*\}"#).unwrap()
});
static WRAPPER_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?text_to_translate>").unwrap());

const ANSWER_PREFIXES: &[&str] = &["翻译：", "翻译:", "Translation:", "Translation："];

/// System instruction demanding a `{detected_lang, translation}` JSON object
pub fn build_system_prompt(target_lang: &str, source_lang: &str) -> String {
    let source_instruction = if !source_lang.is_empty() && source_lang != "auto" {
        format!("The source language is {}.", source_lang)
    } else {
        "Auto-detect the source language.".to_string()
    };

    format!(
        "You are a world-class professional translator.\n\n\
         ## Task:\n\
         {source_instruction}\n\
         Translate the given text into **{target_lang}**.\n\n\
         ## Output format (STRICTLY FOLLOW):\n\
         You MUST respond with a valid JSON object and NOTHING else:\n\
         {{\"detected_lang\": \"<source language name>\", \"translation\": \"<translated text>\"}}\n\n\
         ## Translation rules:\n\
         1. Translate accurately and naturally, matching target language conventions\n\
         2. Preserve formatting: line breaks, punctuation, spacing, paragraphs\n\
         3. Translate idioms/slang into natural equivalents\n\
         4. Maintain original tone (formal/informal/technical/casual)\n\
         5. Keep proper nouns in original or widely accepted translation\n\
         6. Use standard terminology for technical terms\n\
         7. If text is ALREADY in the target language, set translation to the original text\n\
         8. For mixed-language text, translate only the non-target-language parts\n\
         9. detected_lang: readable name (English, 中文, 日本語, etc.)\n\
         10. Do NOT wrap JSON in markdown code blocks\n"
    )
}

pub fn build_user_prompt(text: &str) -> String {
    format!("<text_to_translate>\n{}\n</text_to_translate>", text)
}

#[derive(Deserialize)]
struct StructuredReply {
    #[serde(alias = "detectedLang")]
    detected_lang: Option<String>,
    translation: String,
}

fn structured(raw: &str) -> Option<ProviderReply> {
    let reply: StructuredReply = serde_json::from_str(raw).ok()?;
    Some(ProviderReply {
        detected_lang: reply
            .detected_lang
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_LANG.to_string()),
        translation: reply.translation,
    })
}

/// Parse a model reply: strict JSON, then an embedded JSON object, then the
/// cleaned raw text. Never fails; models do not reliably honor the format.
pub fn parse_response(raw: &str) -> ProviderReply {
    let trimmed = raw.trim();
    let unfenced = FENCE_OPEN.replace(trimmed, "");
    let unfenced = FENCE_CLOSE.replace(&unfenced, "");
    let cleaned = unfenced.trim();

    if let Some(reply) = structured(cleaned) {
        return reply;
    }

    if let Some(found) = EMBEDDED_OBJECT.find(cleaned) {
        if let Some(reply) = structured(found.as_str()) {
            return reply;
        }
    }

    let mut text = cleaned;
    for prefix in ANSWER_PREFIXES {
        if let Some(rest) = text.strip_prefix(prefix) {
            text = rest.trim();
        }
    }
    ProviderReply {
        detected_lang: UNKNOWN_LANG.to_string(),
        translation: WRAPPER_TAG.replace_all(text, "").trim().to_string(),
    }
}
