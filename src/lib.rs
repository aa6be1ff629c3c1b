//! lingo-relay - multi-engine AI translation relay
//!
//! Routes translation requests across several LLM providers with
//! latency-ranked fallback, bounded retries, per-user rate limiting, a result
//! cache and durable per-chat settings and statistics.

#![forbid(unsafe_code)]

pub mod cli;
pub mod core;
pub mod providers;
pub mod server;
pub mod store;

// Re-export key types for convenience
pub use crate::core::{
    config::TranslatorConfig,
    errors::TranslationError,
    models::{ChatConfig, ChatStats, Engine, TranslationRequest, TranslationResult},
    orchestrator::Orchestrator,
    service::{ServedTranslation, TranslationService},
};

pub use providers::{Provider, ProviderFactory, ProviderRegistry};
pub use store::ChatStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
