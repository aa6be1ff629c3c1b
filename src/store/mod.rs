//! Durable per-chat settings and usage statistics
//!
//! Two JSON documents keyed by the stringified chat id: `settings.json` and
//! `stats.json` under the data directory.

pub mod document;

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::core::models::{ChatConfig, ChatId, ChatStats, GlobalStats};

pub use document::{AtomicFileSink, JsonDocument, SnapshotSink, StoreResult};

/// Write-coalescing window for statistics
pub const DEBOUNCE: Duration = Duration::from_secs(5);

pub const SETTINGS_FILE: &str = "settings.json";
pub const STATS_FILE: &str = "stats.json";

type SettingsDoc = BTreeMap<String, ChatConfig>;
type StatsDoc = BTreeMap<String, ChatStats>;

fn now_epoch() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Settings and statistics store
pub struct ChatStore {
    settings: JsonDocument<SettingsDoc>,
    stats: JsonDocument<StatsDoc>,
}

impl ChatStore {
    /// File-backed store under `data_dir`
    pub fn open(data_dir: impl AsRef<Path>, debounce: Duration) -> Self {
        let dir = data_dir.as_ref();
        info!("Chat store at {}", dir.display());
        Self::with_sinks(
            Box::new(AtomicFileSink::new(dir.join(SETTINGS_FILE))),
            Box::new(AtomicFileSink::new(dir.join(STATS_FILE))),
            debounce,
        )
    }

    pub fn with_sinks(
        settings: Box<dyn SnapshotSink>,
        stats: Box<dyn SnapshotSink>,
        debounce: Duration,
    ) -> Self {
        Self {
            settings: JsonDocument::new(settings, debounce),
            stats: JsonDocument::new(stats, debounce),
        }
    }

    /// Stored options for a chat, empty when never set
    pub fn get_chat_config(&self, chat_id: ChatId) -> ChatConfig {
        self.settings
            .read(|doc| doc.get(&chat_id.to_string()).cloned())
            .unwrap_or_default()
    }

    /// Merge `patch` into the chat's options and persist immediately
    pub fn set_chat_config(&self, chat_id: ChatId, patch: ChatConfig) -> ChatConfig {
        self.settings.write(true, |doc| {
            let entry = doc.entry(chat_id.to_string()).or_default();
            entry.merge(patch);
            entry.clone()
        })
    }

    /// Arbitrary edit, including key removal; an emptied config is dropped
    pub fn update_chat_config<F>(&self, chat_id: ChatId, edit: F) -> ChatConfig
    where
        F: FnOnce(&mut ChatConfig),
    {
        self.settings.write(true, |doc| {
            let key = chat_id.to_string();
            let mut config = doc.get(&key).cloned().unwrap_or_default();
            edit(&mut config);
            if config.is_empty() {
                doc.remove(&key);
            } else {
                doc.insert(key, config.clone());
            }
            config
        })
    }

    /// Forget the chat's options; `false` when there were none
    pub fn reset_chat_config(&self, chat_id: ChatId) -> bool {
        let key = chat_id.to_string();
        if !self.settings.read(|doc| doc.contains_key(&key)) {
            return false;
        }
        self.settings.write(true, |doc| doc.remove(&key).is_some())
    }

    /// Count one translation attempt (debounced)
    pub fn record_translation(&self, chat_id: ChatId, engine: &str, chars: u64, success: bool) {
        let now = now_epoch();
        self.stats.write(false, |doc| {
            let stats = doc.entry(chat_id.to_string()).or_default();
            stats.total += 1;
            if success {
                stats.success += 1;
            } else {
                stats.fail += 1;
            }
            stats.chars += chars;
            *stats.providers.entry(engine.to_string()).or_insert(0) += 1;
            stats.first_use.get_or_insert(now);
            stats.last_use = Some(now);
        });
    }

    /// Counters for one chat, zeroed when it never translated
    pub fn get_stats(&self, chat_id: ChatId) -> ChatStats {
        self.stats
            .read(|doc| doc.get(&chat_id.to_string()).cloned())
            .unwrap_or_default()
    }

    pub fn get_global_stats(&self) -> GlobalStats {
        self.stats.read(|doc| GlobalStats {
            total_translations: doc.values().map(|s| s.total).sum(),
            total_chars: doc.values().map(|s| s.chars).sum(),
            total_chats: doc.len(),
        })
    }

    /// Drop a chat's counters and persist immediately
    pub fn clear_chat_stats(&self, chat_id: ChatId) -> bool {
        let key = chat_id.to_string();
        if !self.stats.read(|doc| doc.contains_key(&key)) {
            return false;
        }
        self.stats.write(true, |doc| doc.remove(&key).is_some())
    }

    /// Persist every pending write (shutdown)
    pub fn flush_all(&self) {
        self.settings.flush();
        self.stats.flush();
        info!("Chat store flushed");
    }

    pub fn has_pending_writes(&self) -> bool {
        self.settings.is_dirty() || self.stats.is_dirty()
    }
}
