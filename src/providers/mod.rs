//! Remote translation backends
//!
//! One [`Provider`] implementation per API family. Prompt construction and
//! reply parsing are shared free functions in [`prompt`].

pub mod claude;
pub mod gemini;
pub mod openai;
pub mod prompt;
pub mod registry;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::core::errors::{Result, TranslationError};
use crate::core::models::{Engine, EngineFamily, ProviderReply};

pub use claude::ClaudeProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiCompatibleProvider;
pub use registry::ProviderRegistry;

/// Sampling settings sent with every request
pub(crate) const TEMPERATURE: f64 = 0.1;
pub(crate) const TOP_P: f64 = 0.95;
pub(crate) const MAX_OUTPUT_TOKENS: u32 = 4096;

/// A remote translation backend
#[async_trait]
pub trait Provider: Send + Sync {
    /// Engine name this instance serves
    fn name(&self) -> &str;

    /// Model used for requests
    fn model(&self) -> &str;

    /// Translate `text` into `target_lang`
    async fn translate(
        &self,
        text: &str,
        target_lang: &str,
        source_lang: &str,
    ) -> Result<ProviderReply>;
}

/// Builds providers for the registry
pub trait ProviderFactory: Send + Sync {
    fn create(&self, engine: &str, api_key: &str, model: Option<&str>) -> Result<Arc<dyn Provider>>;
}

/// Factory for the real HTTP backends
#[derive(Debug, Clone)]
pub struct HttpProviderFactory {
    client: reqwest::Client,
    base_urls: BTreeMap<String, String>,
}

impl HttpProviderFactory {
    pub fn new(base_urls: BTreeMap<String, String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Some(Duration::from_secs(30)))
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self { client, base_urls })
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn create(&self, engine: &str, api_key: &str, model: Option<&str>) -> Result<Arc<dyn Provider>> {
        let parsed: Engine = engine.parse().map_err(TranslationError::config)?;
        let model = model.unwrap_or(parsed.default_model()).to_string();
        let base_url = self
            .base_urls
            .get(parsed.as_str())
            .cloned()
            .unwrap_or_else(|| parsed.default_base_url().to_string());

        debug!("Building {} provider for {} ({})", parsed.family(), parsed, model);

        let provider: Arc<dyn Provider> = match parsed.family() {
            EngineFamily::OpenAiCompatible => Arc::new(OpenAiCompatibleProvider::new(
                self.client.clone(),
                parsed.as_str(),
                api_key,
                model,
                base_url,
            )),
            EngineFamily::Claude => Arc::new(ClaudeProvider::new(
                self.client.clone(),
                api_key,
                model,
                base_url,
            )),
            EngineFamily::Gemini => Arc::new(GeminiProvider::new(
                self.client.clone(),
                api_key,
                model,
                base_url,
            )),
        };

        Ok(provider)
    }
}

/// Send a prepared request and return the JSON body of a 2xx reply
pub(crate) async fn send_json(
    engine: &str,
    request: reqwest::RequestBuilder,
) -> Result<serde_json::Value> {
    let response = request
        .send()
        .await
        .map_err(|e| TranslationError::provider(engine, format!("network error: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(200).collect();
        let message = if status.as_u16() == 429 {
            format!("rate limited upstream (429): {}", snippet)
        } else {
            format!("HTTP {}: {}", status.as_u16(), snippet)
        };
        return Err(TranslationError::provider(engine, message));
    }

    response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| TranslationError::provider(engine, format!("invalid response body: {}", e)))
}

/// Pull the reply text out of a JSON body or report what was missing
pub(crate) fn reply_text<'a>(
    engine: &str,
    body: &'a serde_json::Value,
    pointer: &str,
) -> Result<&'a str> {
    body.pointer(pointer)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .ok_or_else(|| TranslationError::provider(engine, format!("no text at {} in response", pointer)))
}
