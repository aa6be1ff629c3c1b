//! Lazily built, cached provider instances keyed by engine name

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::info;

use super::{Provider, ProviderFactory};
use crate::core::errors::{Result, TranslationError};
use crate::core::models::Engine;

/// Registry for provider instances
///
/// Holds the credentials and a cache of constructed providers. Nothing here
/// is held across a network call.
pub struct ProviderRegistry {
    factory: Arc<dyn ProviderFactory>,
    credentials: RwLock<BTreeMap<String, String>>,
    providers: RwLock<HashMap<String, Arc<dyn Provider>>>,
}

fn cache_key(engine: &str, model: Option<&str>) -> String {
    match model {
        Some(model) => format!("{}@{}", engine, model),
        None => engine.to_string(),
    }
}

impl ProviderRegistry {
    pub fn new(factory: Arc<dyn ProviderFactory>, credentials: BTreeMap<String, String>) -> Self {
        Self {
            factory,
            credentials: RwLock::new(normalize(credentials)),
            providers: RwLock::new(HashMap::new()),
        }
    }

    /// Cached provider for `engine`, building it on first use
    pub fn get_provider(&self, engine: &str, model: Option<&str>) -> Result<Arc<dyn Provider>> {
        let name = engine.trim().to_lowercase();
        let key = cache_key(&name, model);

        if let Some(provider) = self.providers.read().get(&key) {
            return Ok(provider.clone());
        }

        let api_key = self
            .credentials
            .read()
            .get(&name)
            .cloned()
            .ok_or_else(|| TranslationError::config(format!("no API key configured for {}", name)))?;

        let provider = self.factory.create(&name, &api_key, model)?;
        self.providers.write().insert(key, provider.clone());
        info!("Created provider: {} ({})", name, provider.model());

        Ok(provider)
    }

    /// Engines with a credential: catalog engines first, in catalog order
    pub fn available_engines(&self) -> Vec<String> {
        let credentials = self.credentials.read();
        let mut engines: Vec<String> = Engine::ALL
            .iter()
            .map(|e| e.as_str().to_string())
            .filter(|name| credentials.contains_key(name))
            .collect();
        engines.extend(
            credentials
                .keys()
                .filter(|name| name.parse::<Engine>().is_err())
                .cloned(),
        );
        engines
    }

    pub fn has_credential(&self, engine: &str) -> bool {
        self.credentials
            .read()
            .contains_key(&engine.trim().to_lowercase())
    }

    /// Drop every cached provider
    pub fn clear(&self) {
        self.providers.write().clear();
    }

    /// Swap credentials and drop cached providers (hot reload)
    pub fn reload_credentials(&self, credentials: BTreeMap<String, String>) {
        *self.credentials.write() = normalize(credentials);
        self.clear();
        info!("Provider credentials reloaded: {:?}", self.available_engines());
    }

    pub fn cached_count(&self) -> usize {
        self.providers.read().len()
    }
}

fn normalize(credentials: BTreeMap<String, String>) -> BTreeMap<String, String> {
    credentials
        .into_iter()
        .map(|(name, key)| (name.trim().to_lowercase(), key.trim().to_string()))
        .filter(|(_, key)| !key.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ProviderReply;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Named(String, String);

    #[async_trait]
    impl Provider for Named {
        fn name(&self) -> &str {
            &self.0
        }

        fn model(&self) -> &str {
            &self.1
        }

        async fn translate(&self, text: &str, _: &str, _: &str) -> Result<ProviderReply> {
            Ok(ProviderReply {
                detected_lang: "unknown".to_string(),
                translation: text.to_string(),
            })
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        built: AtomicUsize,
    }

    impl ProviderFactory for CountingFactory {
        fn create(&self, engine: &str, _: &str, model: Option<&str>) -> Result<Arc<dyn Provider>> {
            self.built.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Named(
                engine.to_string(),
                model.unwrap_or("default").to_string(),
            )))
        }
    }

    fn creds(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_provider_built_once_and_cached() {
        let factory = Arc::new(CountingFactory::default());
        let registry = ProviderRegistry::new(factory.clone(), creds(&[("openai", "k")]));

        let first = registry.get_provider("openai", None).unwrap();
        let second = registry.get_provider(" OpenAI ", None).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_model_override_gets_own_instance() {
        let factory = Arc::new(CountingFactory::default());
        let registry = ProviderRegistry::new(factory.clone(), creds(&[("openai", "k")]));

        let default = registry.get_provider("openai", None).unwrap();
        let custom = registry.get_provider("openai", Some("gpt-4o")).unwrap();

        assert_eq!(default.model(), "default");
        assert_eq!(custom.model(), "gpt-4o");
        assert_eq!(registry.cached_count(), 2);
    }

    #[test]
    fn test_missing_credential_is_config_error() {
        let registry = ProviderRegistry::new(
            Arc::new(CountingFactory::default()),
            creds(&[("claude", ""), ("gemini", "k")]),
        );

        let err = registry.get_provider("claude", None).err().unwrap();
        assert!(matches!(err, TranslationError::ConfigError { .. }));
        assert_eq!(registry.available_engines(), vec!["gemini".to_string()]);
    }

    #[test]
    fn test_reload_swaps_credentials_and_clears_cache() {
        let factory = Arc::new(CountingFactory::default());
        let registry = ProviderRegistry::new(factory.clone(), creds(&[("groq", "old")]));
        registry.get_provider("groq", None).unwrap();
        assert_eq!(registry.cached_count(), 1);

        registry.reload_credentials(creds(&[("mistral", "new"), ("deepseek", "new")]));

        assert_eq!(registry.cached_count(), 0);
        assert!(!registry.has_credential("groq"));
        assert_eq!(
            registry.available_engines(),
            vec!["deepseek".to_string(), "mistral".to_string()]
        );
        registry.get_provider("mistral", None).unwrap();
        assert_eq!(factory.built.load(Ordering::SeqCst), 2);
    }
}
