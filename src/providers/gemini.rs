//! Google Gemini generateContent API

use async_trait::async_trait;
use serde_json::json;

use super::prompt::{build_system_prompt, build_user_prompt, parse_response};
use super::{reply_text, send_json, Provider, MAX_OUTPUT_TOKENS, TEMPERATURE, TOP_P};
use crate::core::errors::Result;
use crate::core::models::ProviderReply;

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(
        client: reqwest::Client,
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn translate(
        &self,
        text: &str,
        target_lang: &str,
        source_lang: &str,
    ) -> Result<ProviderReply> {
        let body = json!({
            "systemInstruction": {
                "parts": [{"text": build_system_prompt(target_lang, source_lang)}]
            },
            "contents": [{
                "role": "user",
                "parts": [{"text": build_user_prompt(text)}]
            }],
            "generationConfig": {
                "temperature": TEMPERATURE,
                "topP": TOP_P,
                "maxOutputTokens": MAX_OUTPUT_TOKENS,
            },
        });

        let request = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body);

        let response = send_json(self.name(), request).await?;
        let raw = reply_text(self.name(), &response, "/candidates/0/content/parts/0/text")?;

        Ok(parse_response(raw))
    }
}
