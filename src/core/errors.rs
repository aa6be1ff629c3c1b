//! Custom error types for translation operations

use thiserror::Error;

/// Translation-related errors
///
/// Only `ValidationError`, `RateLimited` and `AllEnginesFailed` ever leave the
/// orchestration layer; the remaining variants are per-attempt failures that
/// end up in the aggregated digest.
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Bad input, rejected before any remote call
    #[error("Invalid request: {message}")]
    ValidationError {
        message: String,
    },

    /// Missing credential or unsupported engine
    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
    },

    /// A single provider call exceeded its deadline
    #[error("[{engine}] timed out ({elapsed_secs:.1}s > {limit_secs:.1}s)")]
    TimeoutError {
        engine: String,
        elapsed_secs: f64,
        limit_secs: f64,
    },

    /// Remote failure or unusable response
    #[error("[{engine}] {message}")]
    ProviderError {
        engine: String,
        message: String,
    },

    /// Per-user admission gate rejected the request
    #[error("Too many requests: limit is {limit_per_minute} per minute")]
    RateLimited {
        user_id: i64,
        limit_per_minute: usize,
    },

    /// Every engine in the try list was exhausted
    #[error("All engines failed:\n{}", digest.join("\n"))]
    AllEnginesFailed {
        digest: Vec<String>,
    },

    /// Reqwest error
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl TranslationError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        TranslationError::ValidationError {
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        TranslationError::ConfigError {
            message: message.into(),
        }
    }

    pub(crate) fn provider(engine: impl Into<String>, message: impl Into<String>) -> Self {
        TranslationError::ProviderError {
            engine: engine.into(),
            message: message.into(),
        }
    }

    /// Whether this failure should consume one retry attempt
    pub fn counts_as_attempt(&self) -> bool {
        !matches!(
            self,
            TranslationError::ConfigError { .. } | TranslationError::ValidationError { .. }
        )
    }
}

impl From<anyhow::Error> for TranslationError {
    fn from(err: anyhow::Error) -> Self {
        TranslationError::ConfigError {
            message: err.to_string(),
        }
    }
}

/// Result type for translation operations
pub type Result<T> = std::result::Result<T, TranslationError>;

/// Persistence errors; logged by the store, never surfaced to callers
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_message_lists_digest() {
        let err = TranslationError::AllEnginesFailed {
            digest: vec!["[openai] boom".to_string(), "[claude] 401".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("All engines failed:"));
        assert!(msg.contains("[openai] boom\n[claude] 401"));
    }

    #[test]
    fn test_timeout_is_distinct_from_provider_error() {
        let timeout = TranslationError::TimeoutError {
            engine: "groq".to_string(),
            elapsed_secs: 30.04,
            limit_secs: 30.0,
        };
        assert_eq!(timeout.to_string(), "[groq] timed out (30.0s > 30.0s)");
        assert!(timeout.counts_as_attempt());
        assert!(!TranslationError::config("no key").counts_as_attempt());
    }
}
