//! Conversation key helpers.
//!
//! The ledger and typing state are keyed by the numeric chat id as a
//! string: for DMs this equals the Telegram user id, for groups it is
//! the (negative) group chat id, so every conversation gets its own
//! credit balance and typing slot.

use teloxide::types::{Message, UserId};

/// Ledger/typing key for the conversation this message belongs to.
pub fn conversation_key(message: &Message) -> String {
    message.chat.id.0.to_string()
}

/// Attempts to extract the sender's user id from a message.
///
/// Returns `None` for messages without a sender (e.g. anonymous admin
/// posts).
pub fn user_id_from_message(message: &Message) -> Option<UserId> {
    message.from.as_ref().map(|user| user.id)
}
