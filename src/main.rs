//! Main entry point for the lingo-relay CLI

#![forbid(unsafe_code)]

use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lingo_relay::cli::commands::{self, Commands};
use lingo_relay::core::config::TranslatorConfig;
use lingo_relay::TranslationService;

/// lingo-relay - multi-engine AI translation relay
#[derive(Parser, Debug)]
#[command(name = "lingo-relay", version, about, long_about = None)]
struct Args {
    /// JSON config file (defaults to environment variables)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{}={}", env!("CARGO_PKG_NAME").replace('-', "_"), log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let Some(command) = args.command else {
        println!("Please specify a command. Use --help for more information.");
        return Ok(());
    };

    let config = TranslatorConfig::load_from(args.config.as_deref())?;
    let service = Arc::new(TranslationService::build(config)?);

    // Execute command
    match command {
        Commands::Serve { host, port } => {
            commands::handle_serve(service, args.config, host, port).await?;
        }
        Commands::Translate {
            text,
            chat,
            user,
            target_lang,
            source_lang,
            engine,
            model,
        } => {
            commands::handle_translate(
                service,
                text,
                chat,
                user,
                target_lang,
                source_lang,
                engine,
                model,
            )
            .await?;
        }
        Commands::Engines => commands::handle_engines(service)?,
        Commands::Ping { engine } => commands::handle_ping(service, engine).await?,
        Commands::Stats { chat } => commands::handle_stats(service, chat)?,
        Commands::Config { action } => commands::handle_config(service, action)?,
        Commands::ClearStats { chat } => commands::handle_clear_stats(service, chat)?,
    }

    Ok(())
}
