//! OpenAI-compatible chat completions (OpenAI, DeepSeek, Groq, Mistral)

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::prompt::{build_system_prompt, build_user_prompt, parse_response};
use super::{reply_text, send_json, Provider, MAX_OUTPUT_TOKENS, TEMPERATURE, TOP_P};
use crate::core::errors::Result;
use crate::core::models::ProviderReply;

#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    engine: String,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        client: reqwest::Client,
        engine: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            engine: engine.into(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.engine
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
            "messages": [
                {"role": "system", "content": build_system_prompt(target_lang, source_lang)},
                {"role": "user", "content": build_user_prompt(text)},
            ],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_OUTPUT_TOKENS,
            "top_p": TOP_P,
        });

        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body);

        let response = send_json(&self.engine, request).await?;
        let raw = reply_text(&self.engine, &response, "/choices/0/message/content")?;
        debug!("[{}] raw reply: {} chars", self.engine, raw.chars().count());

        Ok(parse_response(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::TranslationError;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new(
            reqwest::Client::new(),
            "deepseek",
            "sk-test",
            "deepseek-chat",
            format!("{}/v1/", server.uri()),
        )
    }

    #[tokio::test]
    async fn test_translate_parses_chat_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": "{\"detected_lang\": \"English\", \"translation\": \"你好，世界\"}"
                    }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = provider(&server)
            .translate("Hello, world", "中文", "auto")
            .await
            .unwrap();

        assert_eq!(reply.detected_lang, "English");
        assert_eq!(reply.translation, "你好，世界");
    }

    #[tokio::test]
    async fn test_http_error_becomes_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let err = provider(&server)
            .translate("Hello", "中文", "auto")
            .await
            .unwrap_err();

        match err {
            TranslationError::ProviderError { engine, message } => {
                assert_eq!(engine, "deepseek");
                assert!(message.contains("HTTP 401"));
                assert!(message.contains("invalid api key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
