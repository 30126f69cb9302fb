//! Slash command handlers, reached when the gate delegates a command.

use anyhow::Result;
use teloxide::prelude::Requester;
use teloxide::types::Message;

use bella_core::Command;
use bella_ledger::Tier;

use crate::bot::TelegramBot;
use crate::session::conversation_key;

pub async fn handle_command(bot: &TelegramBot, message: &Message, cmd: &Command) -> Result<()> {
    match cmd.name.as_str() {
        "start" => handle_start(bot, message).await,
        "help" => handle_help(bot, message).await,
        "membership" => handle_membership(bot, message).await,
        "topup" => handle_topup(bot, message).await,
        _ => {
            bot.bot
                .send_message(
                    message.chat.id,
                    "hmm, I don't know that one\ntry /help to see what I can do",
                )
                .await?;
            Ok(())
        }
    }
}

async fn handle_start(bot: &TelegramBot, message: &Message) -> Result<()> {
    bot.bot
        .send_message(
            message.chat.id,
            "heyy, I'm Bella 💕\njust text me whatever's on your mind",
        )
        .await?;
    Ok(())
}

async fn handle_help(bot: &TelegramBot, message: &Message) -> Result<()> {
    bot.bot
        .send_message(
            message.chat.id,
            "/start - say hi\n\
             /membership - your plan and remaining credits\n\
             /topup - how to get more credits\n\
             /help - this message\n\n\
             Everything else you send me is just a conversation. \
             Each reply costs one credit on the free plan.",
        )
        .await?;
    Ok(())
}

async fn handle_membership(bot: &TelegramBot, message: &Message) -> Result<()> {
    let key = conversation_key(message);
    let (_, membership) = bot.gate.ledger().get_or_create(&key).await?;

    let text = match membership.tier {
        Tier::Unlimited => "You're on the unlimited plan, no credit limits for you ✨".to_string(),
        tier => format!(
            "Plan: {}\nCredits left: {}",
            tier.as_str(),
            membership.credit_balance
        ),
    };
    bot.bot.send_message(message.chat.id, text).await?;
    Ok(())
}

async fn handle_topup(bot: &TelegramBot, message: &Message) -> Result<()> {
    bot.bot
        .send_message(
            message.chat.id,
            "Credits are added by the operator for now. \
             Ping the person who runs this bot to top up or upgrade your plan.",
        )
        .await?;
    Ok(())
}
