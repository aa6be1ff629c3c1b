//! Anthropic messages API

use async_trait::async_trait;
use serde_json::json;

use super::prompt::{build_system_prompt, build_user_prompt, parse_response};
use super::{reply_text, send_json, Provider, MAX_OUTPUT_TOKENS, TEMPERATURE, TOP_P};
use crate::core::errors::Result;
use crate::core::models::ProviderReply;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct ClaudeProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl ClaudeProvider {
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
impl Provider for ClaudeProvider {
    fn name(&self) -> &str {
        "claude"
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
            "model": self.model,
            "max_tokens": MAX_OUTPUT_TOKENS,
            "system": build_system_prompt(target_lang, source_lang),
            "messages": [{"role": "user", "content": build_user_prompt(text)}],
            "temperature": TEMPERATURE,
            "top_p": TOP_P,
        });

        let request = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);

        let response = send_json(self.name(), request).await?;
        let raw = reply_text(self.name(), &response, "/content/0/text")?;

        Ok(parse_response(raw))
    }
}
