//! Per-chat translation entry point: rate limit, cache, orchestration, stats

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::core::cache::TranslationCache;
use crate::core::config::TranslatorConfig;
use crate::core::errors::{Result, TranslationError};
use crate::core::latency::LatencyTracker;
use crate::core::models::{ChatId, Engine, TranslationRequest, TranslationResult};
use crate::core::orchestrator::{Orchestrator, OrchestratorSettings};
use crate::core::rate_limiter::RateLimiter;
use crate::providers::{HttpProviderFactory, ProviderRegistry};
use crate::store::ChatStore;

/// A translation as handed to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServedTranslation {
    #[serde(flatten)]
    pub result: TranslationResult,
    pub cache_hit: bool,
    /// Answered by an engine other than the preferred one
    pub fell_back: bool,
}

/// Catalog entry for listings
#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub name: String,
    pub family: String,
    pub default_model: String,
    pub configured: bool,
    pub mean_latency_seconds: Option<f64>,
}

/// Translation service shared by the HTTP API and the CLI
pub struct TranslationService {
    config: TranslatorConfig,
    orchestrator: Orchestrator,
    cache: TranslationCache,
    rate_limiter: RateLimiter,
    store: Arc<ChatStore>,
}

fn cache_engine_key(request: &TranslationRequest) -> String {
    match &request.model {
        Some(model) => format!("{}@{}", request.preferred_engine, model),
        None => request.preferred_engine.clone(),
    }
}

impl TranslationService {
    /// Wire the production stack: HTTP providers and file-backed store
    pub fn build(config: TranslatorConfig) -> Result<Self> {
        config.validate()?;

        let factory = Arc::new(HttpProviderFactory::new(config.base_urls.clone())?);
        let registry = Arc::new(ProviderRegistry::new(factory, config.api_keys.clone()));
        let store = ChatStore::open(&config.data_dir, config.debounce());

        Ok(Self::new(config, registry, store))
    }

    pub fn new(config: TranslatorConfig, registry: Arc<ProviderRegistry>, store: ChatStore) -> Self {
        let orchestrator = Orchestrator::new(
            registry,
            Arc::new(LatencyTracker::new()),
            OrchestratorSettings::from(&config),
        );

        info!(
            "Translation service ready: engines {:?}, cache {}, {} req/min per user",
            orchestrator.registry().available_engines(),
            config.cache_max_size,
            config.rate_limit_per_min
        );

        Self {
            cache: TranslationCache::new(config.cache_max_size),
            rate_limiter: RateLimiter::new(config.rate_limit_per_min),
            store: Arc::new(store),
            orchestrator,
            config,
        }
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<ChatStore> {
        &self.store
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Translate with the chat's stored preferences
    pub async fn translate_for_chat(
        &self,
        user_id: i64,
        chat_id: ChatId,
        text: &str,
    ) -> Result<ServedTranslation> {
        let request = self.request_for_chat(chat_id, text);
        self.translate_text(user_id, chat_id, request).await
    }

    /// Build a request from the chat's settings, falling back to defaults
    pub fn request_for_chat(&self, chat_id: ChatId, text: &str) -> TranslationRequest {
        let chat = self.store.get_chat_config(chat_id);
        let engine = chat
            .provider
            .unwrap_or_else(|| self.config.default_provider.clone());
        let target = chat
            .target_lang
            .unwrap_or_else(|| self.config.default_target_lang.clone());

        TranslationRequest::new(text, target, engine).with_model(chat.model)
    }

    /// Gate, cache and translate one request, recording the outcome
    pub async fn translate_text(
        &self,
        user_id: i64,
        chat_id: ChatId,
        request: TranslationRequest,
    ) -> Result<ServedTranslation> {
        if !self.rate_limiter.check(user_id) {
            warn!("User {} rate limited", user_id);
            return Err(TranslationError::RateLimited {
                user_id,
                limit_per_minute: self.rate_limiter.limit_per_minute(),
            });
        }

        let chars = request.text.chars().count() as u64;
        let engine_key = cache_engine_key(&request);

        if let Some(mut result) = self
            .cache
            .get(&request.text, &request.target_lang, &engine_key)
        {
            info!("[{}] cache hit for chat {}", result.engine, chat_id);
            result.latency_seconds = 0.0;
            self.store
                .record_translation(chat_id, &result.engine, chars, true);
            let fell_back = result.engine != request.preferred_engine;
            return Ok(ServedTranslation {
                result,
                cache_hit: true,
                fell_back,
            });
        }

        match self.orchestrator.translate(&request).await {
            Ok(result) => {
                self.cache.put(
                    &request.text,
                    &request.target_lang,
                    &engine_key,
                    result.clone(),
                );
                self.store
                    .record_translation(chat_id, &result.engine, chars, true);
                let fell_back = result.engine != request.preferred_engine;
                Ok(ServedTranslation {
                    result,
                    cache_hit: false,
                    fell_back,
                })
            }
            Err(e) => {
                if !matches!(e, TranslationError::ValidationError { .. }) {
                    self.store.record_translation(
                        chat_id,
                        &request.preferred_engine,
                        chars,
                        false,
                    );
                }
                Err(e)
            }
        }
    }

    /// Every catalog engine with its credential state and observed latency
    pub fn engines(&self) -> Vec<EngineInfo> {
        let registry = self.orchestrator.registry();
        let latency = self.orchestrator.latency();
        Engine::ALL
            .iter()
            .map(|engine| EngineInfo {
                name: engine.as_str().to_string(),
                family: engine.family().to_string(),
                default_model: engine.default_model().to_string(),
                configured: registry.has_credential(engine.as_str()),
                mean_latency_seconds: latency.mean_latency(engine.as_str()),
            })
            .collect()
    }

    /// Round-trip latency of one engine
    pub async fn probe(&self, engine: &str) -> Result<Duration> {
        let engine: Engine = engine.parse().map_err(TranslationError::validation)?;
        self.orchestrator.probe(engine.as_str()).await
    }

    /// Swap provider credentials without restarting
    pub fn reload_credentials(&self, credentials: BTreeMap<String, String>) {
        self.orchestrator.registry().reload_credentials(credentials);
    }

    /// Flush pending store writes
    pub fn shutdown(&self) {
        self.store.flush_all();
    }
}
