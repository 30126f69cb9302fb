//! Message handlers for routing Telegram updates through the gate.

use anyhow::Result;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::Requester;
use teloxide::types::{Message, MessageEntityKind, ParseMode};
use tracing::{debug, info, warn};

use bella_core::{ContentKind, GateError, InboundMessage, Outcome, RejectReason};

use crate::bot::TelegramBot;
use crate::commands::handle_command;
use crate::config::{DmPolicy, GroupPolicy};
use crate::send::render_reply;
use crate::session::{conversation_key, user_id_from_message};

pub(crate) const REJECT_NOT_ALLOWED: &str = "Not Allowed!";
pub(crate) const REJECT_NO_CREDIT: &str = "You're out of credits 😔 use /topup to keep chatting.";
pub(crate) const REJECT_BUSY: &str = "Hold on, still typing the last one 😅";
pub(crate) const FALLBACK_REPLY: &str = "Sorry, I'm having trouble connecting right now.";

/// Main message handler that routes based on chat type.
pub async fn handle_message(bot: &TelegramBot, message: &Message) -> Result<()> {
    let chat = &message.chat;

    if chat.is_private() {
        handle_dm(bot, message).await
    } else if chat.is_group() || chat.is_supergroup() {
        handle_group(bot, message).await
    } else {
        debug!("Ignoring non-conversation chat type");
        Ok(())
    }
}

async fn handle_dm(bot: &TelegramBot, message: &Message) -> Result<()> {
    let user_id = match user_id_from_message(message) {
        Some(uid) => uid,
        None => {
            warn!("DM message has no sender, ignoring");
            return Ok(());
        }
    };

    match bot.config.dm_policy {
        DmPolicy::Disabled => {
            debug!("DM policy is disabled, ignoring message from {}", user_id);
            return Ok(());
        }
        DmPolicy::Allowlist => {
            if !bot.config.is_allowlisted(user_id.0 as i64) {
                debug!("User {} not in allowlist, ignoring DM", user_id);
                return Ok(());
            }
        }
        DmPolicy::Open => {}
    }

    info!("Processing DM from user {}", user_id);
    process_and_respond(bot, message).await
}

async fn handle_group(bot: &TelegramBot, message: &Message) -> Result<()> {
    let should_process = match bot.config.group_policy {
        GroupPolicy::Disabled => {
            debug!("Group policy is disabled, ignoring message");
            return Ok(());
        }
        GroupPolicy::Always => true,
        GroupPolicy::Mention => is_bot_mentioned(&bot.bot, message).await?,
    };

    if !should_process {
        debug!("Bot not mentioned in group message, ignoring");
        return Ok(());
    }

    info!("Processing group message in chat {}", message.chat.id);
    process_and_respond(bot, message).await
}

/// Translate the Telegram message, run it through the gate, and send
/// whatever the outcome calls for.
async fn process_and_respond(bot: &TelegramBot, message: &Message) -> Result<()> {
    let inbound = match to_inbound(message) {
        Some(inbound) => inbound,
        None => {
            debug!("Message carries no routable content, ignoring");
            return Ok(());
        }
    };

    let result = bot.gate.handle(&inbound).await;

    match &result {
        Ok(Outcome::Replied(text)) => {
            for chunk in render_reply(text) {
                bot.bot
                    .send_message(message.chat.id, chunk)
                    .parse_mode(ParseMode::Html)
                    .await?;
            }
        }
        Ok(Outcome::Delegated(cmd)) => {
            handle_command(bot, message, cmd).await?;
        }
        Ok(Outcome::Errored(detail)) => {
            warn!("Provider error for {}: {}", inbound.user_id, detail);
        }
        Err(GateError::Storage(e)) => {
            warn!("Storage failure for {}: {}", inbound.user_id, e);
        }
        _ => {}
    }

    // Detail stays in the log; the user only ever sees a short notice.
    if let Some(text) = notice_text(&result) {
        bot.bot.send_message(message.chat.id, text).await?;
    }

    match result {
        Err(GateError::Storage(e)) => Err(e),
        Err(GateError::InvalidMessage) => {
            debug!("Dropping invalid message from {}", inbound.user_id);
            Ok(())
        }
        Ok(_) => Ok(()),
    }
}

/// Plain-text notice for gate results that don't carry an assistant
/// reply. `None` means stay silent.
pub(crate) fn notice_text(result: &Result<Outcome, GateError>) -> Option<&'static str> {
    match result {
        Ok(Outcome::Rejected(RejectReason::NotAllowed)) => Some(REJECT_NOT_ALLOWED),
        Ok(Outcome::Rejected(RejectReason::InsufficientCredit)) => Some(REJECT_NO_CREDIT),
        Ok(Outcome::Rejected(RejectReason::Busy)) => Some(REJECT_BUSY),
        Ok(Outcome::Errored(_)) | Err(GateError::Storage(_)) => Some(FALLBACK_REPLY),
        Ok(Outcome::Replied(_)) | Ok(Outcome::Delegated(_)) | Ok(Outcome::Ignored) => None,
        Err(GateError::InvalidMessage) => None,
    }
}

/// Map a Telegram message into the gate's inbound shape. Returns
/// `None` for updates with no content we route (joins, pins, etc).
fn to_inbound(message: &Message) -> Option<InboundMessage> {
    let key = conversation_key(message);

    if let Some(kind) = media_kind(message) {
        return Some(InboundMessage::media(key, kind, message.caption()));
    }

    message.text().map(|text| InboundMessage::text(key, text))
}

fn media_kind(message: &Message) -> Option<ContentKind> {
    if message.photo().is_some() {
        Some(ContentKind::Photo)
    } else if message.voice().is_some() {
        Some(ContentKind::Voice)
    } else if message.video().is_some() {
        Some(ContentKind::Video)
    } else if message.audio().is_some() {
        Some(ContentKind::Audio)
    } else if message.sticker().is_some() {
        Some(ContentKind::Sticker)
    } else if message.document().is_some() {
        Some(ContentKind::Document)
    } else {
        None
    }
}

/// Check if the bot is mentioned in (or replied to by) a message.
async fn is_bot_mentioned(bot: &teloxide::Bot, message: &Message) -> Result<bool> {
    let me = bot.get_me().await?;
    let bot_username: Option<&str> = me.username.as_deref();

    if let Some(reply_to) = &message.reply_to_message() {
        if let Some(ref from) = reply_to.from {
            if from.id == me.id {
                return Ok(true);
            }
        }
    }

    if let Some(entities) = message.entities() {
        for entity in entities {
            if let MessageEntityKind::Mention = entity.kind {
                let text = match message.text() {
                    Some(text) => text,
                    None => continue,
                };
                let start = entity.offset;
                let end = start + entity.length;
                if let Some(mention) = text.get(start..end) {
                    let mentioned = mention.trim_start_matches('@');
                    if bot_username == Some(mentioned) {
                        return Ok(true);
                    }
                }
            }
        }
    }

    Ok(false)
}
