use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use sqlx::any::AnyPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bella_core::{GateConfig, OpenRouterProvider, SessionGate};
use bella_eventlog::{BoundedLogSink, LogStore};
use bella_ledger::LedgerStore;

mod bot;
mod commands;
mod config;
mod handlers;
mod send;
mod session;

use bot::{TelegramActions, TelegramBot};
use config::BotConfig;

#[cfg(test)]
mod tests;

const DEFAULT_DATABASE_URL: &str = "sqlite://bella.db";

#[derive(Parser)]
#[command(name = "telegram")]
#[command(about = "Telegram front-end for the Bella assistant")]
struct Cli {
    /// Path to bot config TOML (falls back to BOT_CONFIG_PATH, then env vars)
    #[arg(long)]
    bot_config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config_path = cli.bot_config.or_else(|| std::env::var("BOT_CONFIG_PATH").ok());
    let config = match config_path {
        Some(path) => BotConfig::from_path(&path)?,
        None => BotConfig::from_env()?,
    };

    let database_url = config
        .database_url
        .clone()
        .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

    sqlx::any::install_default_drivers();
    let pool = AnyPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;

    let ledger = LedgerStore::new(pool.clone(), config.starting_grant);
    ledger.migrate().await?;

    let log_store = Arc::new(LogStore::open(pool, config.log_ceiling_bytes).await?);
    let (log_sink, log_writer) = BoundedLogSink::spawn(log_store);

    let provider = Arc::new(OpenRouterProvider::new(config.provider()));

    let actions = TelegramActions::new(teloxide::Bot::new(config.bot_token.clone()));
    let gate = SessionGate::with_config(ledger, log_sink, provider, actions, GateConfig::default());

    let bot = TelegramBot::new(config, gate);
    bot.run().await?;

    // Let the log writer flush whatever is still queued.
    log_writer.join().await;
    Ok(())
}
