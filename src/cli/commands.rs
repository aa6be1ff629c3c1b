//! CLI command definitions and handlers

use clap::Subcommand;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::core::models::{ChatConfig, ChatId, Engine};
use crate::core::service::TranslationService;

/// Commands for lingo-relay
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP API server
    Serve {
        /// Bind address (default: 0.0.0.0)
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Listen port (default: 8000)
        #[arg(short, long, default_value_t = 8000)]
        port: u16,
    },

    /// Translate one text through the fallback chain
    Translate {
        /// Text to translate
        text: String,

        /// Chat whose stored preferences apply
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        chat: ChatId,

        /// User id for rate limiting
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        user: i64,

        /// Target language (default: chat setting or DEFAULT_TARGET_LANG)
        #[arg(short, long)]
        target_lang: Option<String>,

        /// Source language (auto-detect if not specified)
        #[arg(long)]
        source_lang: Option<String>,

        /// Preferred engine
        #[arg(short, long)]
        engine: Option<String>,

        /// Model override for the preferred engine
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List engines with credential state
    Engines,

    /// Probe engines with a short request
    Ping {
        /// Engine to probe (all configured engines if omitted)
        engine: Option<String>,
    },

    /// Show statistics for a chat, or global totals
    Stats {
        #[arg(long, allow_hyphen_values = true)]
        chat: Option<ChatId>,
    },

    /// Per-chat settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Delete a chat's statistics
    ClearStats {
        #[arg(long, allow_hyphen_values = true)]
        chat: ChatId,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the stored settings
    Show {
        #[arg(long, allow_hyphen_values = true)]
        chat: ChatId,
    },

    /// Merge settings into the chat's config
    Set {
        #[arg(long, allow_hyphen_values = true)]
        chat: ChatId,

        #[arg(long)]
        provider: Option<String>,

        #[arg(long)]
        target_lang: Option<String>,

        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        auto_translate: Option<bool>,
    },

    /// Drop the chat's settings
    Reset {
        #[arg(long, allow_hyphen_values = true)]
        chat: ChatId,
    },
}

/// Handle server command
pub async fn handle_serve(
    service: Arc<TranslationService>,
    config_path: Option<PathBuf>,
    host: String,
    port: u16,
) -> anyhow::Result<()> {
    use crate::server::api::run_server;

    info!("Starting HTTP server on {}:{}", host, port);
    println!("🚀 Server starting on http://{}:{}", host, port);

    run_server(service, config_path, host, port).await?;

    Ok(())
}

/// Handle translate command
#[allow(clippy::too_many_arguments)]
pub async fn handle_translate(
    service: Arc<TranslationService>,
    text: String,
    chat: ChatId,
    user: i64,
    target_lang: Option<String>,
    source_lang: Option<String>,
    engine: Option<String>,
    model: Option<String>,
) -> anyhow::Result<()> {
    let mut request = service.request_for_chat(chat, &text);
    if let Some(engine) = engine {
        request.preferred_engine = engine.parse::<Engine>().map_err(anyhow::Error::msg)?.to_string();
        request.model = None;
    }
    if model.is_some() {
        request = request.with_model(model);
    }
    if let Some(target) = target_lang {
        request.target_lang = target;
    }
    if let Some(source) = source_lang {
        request = request.with_source_lang(source);
    }

    let served = service.translate_text(user, chat, request).await;
    service.shutdown();
    let served = served?;

    println!("{}", served.result.translation);
    println!(
        "\n🔤 {} → {}",
        served.result.detected_lang, served.result.target_lang
    );
    if served.cache_hit {
        println!("⚡ cache");
    } else {
        println!(
            "⚡ {}{} · {:.1}s",
            served.result.engine,
            if served.fell_back { " (fallback)" } else { "" },
            served.result.latency_seconds
        );
    }

    Ok(())
}

/// Handle engines command
pub fn handle_engines(service: Arc<TranslationService>) -> anyhow::Result<()> {
    println!("{:<10} {:<18} {:<28} {}", "ENGINE", "FAMILY", "DEFAULT MODEL", "STATUS");
    for engine in service.engines() {
        let status = if engine.configured { "✅ configured" } else { "❌ no key" };
        println!(
            "{:<10} {:<18} {:<28} {}",
            engine.name, engine.family, engine.default_model, status
        );
    }
    Ok(())
}

/// Handle ping command
pub async fn handle_ping(
    service: Arc<TranslationService>,
    engine: Option<String>,
) -> anyhow::Result<()> {
    let engines = match engine {
        Some(name) => vec![name.parse::<Engine>().map_err(anyhow::Error::msg)?.to_string()],
        None => service.orchestrator().registry().available_engines(),
    };

    if engines.is_empty() {
        anyhow::bail!("No engines configured");
    }

    for name in engines {
        match service.probe(&name).await {
            Ok(elapsed) => println!("✅ {:<10} {:.2}s", name, elapsed.as_secs_f64()),
            Err(e) => println!("❌ {:<10} {}", name, e),
        }
    }

    Ok(())
}

/// Handle stats command
pub fn handle_stats(service: Arc<TranslationService>, chat: Option<ChatId>) -> anyhow::Result<()> {
    let store = service.store();
    match chat {
        Some(chat) => {
            let stats = store.get_stats(chat);
            println!("📊 Chat {}", chat);
            println!("   Total: {}", stats.total);
            println!("   Success: {}", stats.success);
            println!("   Failed: {}", stats.fail);
            println!("   Characters: {}", stats.chars);
            if let Some(rate) = stats.success_rate() {
                println!("   Success rate: {:.1}%", rate);
            }
            if let Some(engine) = stats.top_engine() {
                println!("   Most used engine: {}", engine);
            }
        }
        None => {
            let global = store.get_global_stats();
            println!("🌐 Global");
            println!("   Translations: {}", global.total_translations);
            println!("   Characters: {}", global.total_chars);
            println!("   Chats: {}", global.total_chats);
        }
    }
    Ok(())
}

/// Handle config subcommands
pub fn handle_config(service: Arc<TranslationService>, action: ConfigAction) -> anyhow::Result<()> {
    let store = service.store();
    let config = match action {
        ConfigAction::Show { chat } => store.get_chat_config(chat),
        ConfigAction::Set {
            chat,
            provider,
            target_lang,
            model,
            auto_translate,
        } => {
            let provider = provider
                .map(|p| p.parse::<Engine>().map(|e| e.to_string()))
                .transpose()
                .map_err(anyhow::Error::msg)?;
            let patch = ChatConfig {
                provider,
                target_lang,
                model,
                auto_translate,
                ..Default::default()
            };
            if patch.is_empty() {
                anyhow::bail!("Nothing to set");
            }
            store.set_chat_config(chat, patch)
        }
        ConfigAction::Reset { chat } => {
            let removed = store.reset_chat_config(chat);
            println!(
                "{}",
                if removed { "✅ Settings reset" } else { "No settings stored" }
            );
            return Ok(());
        }
    };

    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Handle clear-stats command
pub fn handle_clear_stats(service: Arc<TranslationService>, chat: ChatId) -> anyhow::Result<()> {
    if service.store().clear_chat_stats(chat) {
        println!("✅ Statistics cleared for chat {}", chat);
    } else {
        println!("No statistics for chat {}", chat);
    }
    Ok(())
}
