use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::ChatAction;
use tracing::{error, info};

use bella_core::{PlatformActions, SessionGate};

use crate::config::BotConfig;
use crate::handlers::handle_message;

/// Sends chat actions for the gate's typing indicator. Conversation
/// keys are numeric chat ids (see `session::conversation_key`).
#[derive(Clone)]
pub struct TelegramActions {
    bot: Bot,
}

impl TelegramActions {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl PlatformActions for TelegramActions {
    async fn send_typing(&self, conversation_id: &str) -> Result<()> {
        let chat_id: i64 = conversation_id
            .parse()
            .map_err(|_| anyhow::anyhow!("non-numeric conversation key: {conversation_id}"))?;
        self.bot
            .send_chat_action(ChatId(chat_id), ChatAction::Typing)
            .await?;
        Ok(())
    }
}

pub struct TelegramBot {
    pub bot: Bot,
    pub config: BotConfig,
    pub gate: SessionGate<TelegramActions>,
}

impl TelegramBot {
    pub fn new(config: BotConfig, gate: SessionGate<TelegramActions>) -> Self {
        let bot = Bot::new(config.bot_token.clone());
        Self { bot, config, gate }
    }

    /// Run the bot with long-polling until interrupted.
    pub async fn run(self) -> Result<()> {
        info!("Starting Telegram bot...");

        let bot = Arc::new(self);

        let handler = dptree::entry().branch(Update::filter_message().endpoint(
            |msg: Message, bot_ref: Arc<TelegramBot>| async move {
                if let Err(e) = handle_message(&bot_ref, &msg).await {
                    error!("Error handling message: {}", e);
                }
                respond(())
            },
        ));

        Dispatcher::builder(bot.bot.clone(), handler)
            .dependencies(dptree::deps![bot.clone()])
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        info!("Telegram bot stopped");
        Ok(())
    }
}
