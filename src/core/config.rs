//! Configuration management

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::core::models::Engine;

/// Configuration for translator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// engine name → API key; empty keys are treated as absent
    pub api_keys: BTreeMap<String, String>,
    /// engine name → base URL override
    pub base_urls: BTreeMap<String, String>,
    pub default_provider: String,
    pub default_target_lang: String,
    pub max_text_length: usize,
    pub rate_limit_per_min: usize,
    pub cache_max_size: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub timeout_ms: u64,
    pub debounce_ms: u64,
    pub data_dir: PathBuf,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            api_keys: BTreeMap::new(),
            base_urls: BTreeMap::new(),
            default_provider: "deepseek".to_string(),
            default_target_lang: "中文".to_string(),
            max_text_length: 4000,
            rate_limit_per_min: 30,
            cache_max_size: 500,
            max_retries: 2,
            retry_delay_ms: 1000,
            timeout_ms: 30000,
            debounce_ms: 5000,
            data_dir: PathBuf::from("data"),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid value for {}: {}", key, e)),
        _ => Ok(default),
    }
}

/// Read every `<ENGINE>_API_KEY` variable, skipping empty ones
pub fn api_keys_from_env() -> BTreeMap<String, String> {
    Engine::ALL
        .iter()
        .filter_map(|engine| {
            std::env::var(engine.api_key_var())
                .ok()
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty())
                .map(|key| (engine.as_str().to_string(), key))
        })
        .collect()
}

impl TranslatorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let base_urls = Engine::ALL
            .iter()
            .filter_map(|engine| {
                std::env::var(engine.base_url_var())
                    .ok()
                    .filter(|url| !url.trim().is_empty())
                    .map(|url| (engine.as_str().to_string(), url.trim().to_string()))
            })
            .collect();

        Ok(Self {
            api_keys: api_keys_from_env(),
            base_urls,
            default_provider: env_or("DEFAULT_PROVIDER", defaults.default_provider)?
                .to_lowercase(),
            default_target_lang: env_or("DEFAULT_TARGET_LANG", defaults.default_target_lang)?,
            max_text_length: env_or("MAX_TEXT_LENGTH", defaults.max_text_length)?,
            rate_limit_per_min: env_or("RATE_LIMIT_PER_MIN", defaults.rate_limit_per_min)?,
            cache_max_size: env_or("CACHE_MAX_SIZE", defaults.cache_max_size)?,
            max_retries: env_or("MAX_RETRIES", defaults.max_retries)?,
            retry_delay_ms: env_or("RETRY_DELAY_MS", defaults.retry_delay_ms)?,
            timeout_ms: env_or("TRANSLATE_TIMEOUT_MS", defaults.timeout_ms)?,
            debounce_ms: env_or("DEBOUNCE_MS", defaults.debounce_ms)?,
            data_dir: env_or("DATA_DIR", defaults.data_dir)?,
        })
    }

    /// Load `.env`, then the environment, then validate
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(None)
    }

    /// A JSON file when `path` is given, else the environment. A file without
    /// API keys takes them from the environment.
    fn from_source(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::from_env()?,
        };
        if path.is_some() && config.api_keys.is_empty() {
            config.api_keys = api_keys_from_env();
        }
        config.validate()?;
        Ok(config)
    }

    /// Startup load; variables already set win over `.env`
    pub fn load_from(path: Option<&Path>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_source(path)?;

        info!(
            "Loaded config: {} engine(s) configured, default {} → {}",
            config.available_engines().len(),
            config.default_provider,
            config.default_target_lang
        );

        Ok(config)
    }

    /// Re-read the source the process started with; `.env` overrides
    /// variables already set so rotated keys take effect
    pub fn reload_from(path: Option<&Path>) -> anyhow::Result<Self> {
        dotenvy::dotenv_override().ok();
        let config = Self::from_source(path)?;
        info!(
            "Reloaded config: {} engine(s) configured",
            config.available_engines().len()
        );
        Ok(config)
    }

    /// Load from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Err(e) = self.default_provider.parse::<Engine>() {
            return Err(anyhow::anyhow!("DEFAULT_PROVIDER: {}", e));
        }

        for name in self.api_keys.keys() {
            if name.parse::<Engine>().is_err() {
                warn!("Ignoring API key for unknown engine: {}", name);
            }
        }

        if self.available_engines().is_empty() {
            warn!("No API keys configured; every translation will fail");
        }

        if self.max_text_length == 0 {
            return Err(anyhow::anyhow!("max_text_length must be greater than 0"));
        }

        if self.rate_limit_per_min == 0 {
            return Err(anyhow::anyhow!("rate_limit_per_min must be greater than 0"));
        }

        if self.cache_max_size < 2 {
            return Err(anyhow::anyhow!("cache_max_size must be at least 2"));
        }

        if self.max_retries == 0 {
            return Err(anyhow::anyhow!("max_retries must be greater than 0"));
        }

        if self.timeout_ms == 0 {
            return Err(anyhow::anyhow!("timeout_ms must be greater than 0"));
        }

        Ok(())
    }

    /// Engines with a non-empty key, in catalog order
    pub fn available_engines(&self) -> Vec<Engine> {
        Engine::ALL
            .iter()
            .copied()
            .filter(|engine| {
                self.api_keys
                    .get(engine.as_str())
                    .is_some_and(|key| !key.trim().is_empty())
            })
            .collect()
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
