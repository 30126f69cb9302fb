//! Inbound message classification.

use crate::error::GateError;
use crate::types::{Command, InboundMessage, MessageClass};

/// Classify an inbound message. Pure, no side effects.
///
/// Media takes precedence over everything carried alongside it: a
/// photo with a caption, even a caption that looks like a command,
/// classifies as media. Empty or malformed messages fail with
/// [`GateError::InvalidMessage`] and are never charged.
pub fn classify(message: &InboundMessage) -> Result<MessageClass, GateError> {
    if message.user_id.trim().is_empty() {
        return Err(GateError::InvalidMessage);
    }

    if message.content_kind.is_media() {
        return Ok(MessageClass::Media(message.content_kind));
    }

    let text = message.content.as_deref().unwrap_or("").trim();
    if text.is_empty() {
        return Err(GateError::InvalidMessage);
    }

    if let Some((name, args)) = parse_command(text) {
        return Ok(MessageClass::Command(Command {
            name: name.to_string(),
            args: args.to_string(),
        }));
    }

    Ok(MessageClass::Text(text.to_string()))
}

/// Check if a text is a slash command and return the command name and args.
pub fn parse_command(text: &str) -> Option<(&str, &str)> {
    if !text.starts_with('/') {
        return None;
    }

    let text = text.trim();
    let mut parts = text.splitn(2, |c: char| c.is_whitespace());
    let cmd = parts.next()?.trim_start_matches('/');
    let args = parts.next().unwrap_or("").trim();

    // Remove @botname suffix if present
    let cmd = cmd.split('@').next()?;

    if cmd.is_empty() {
        return None;
    }

    Some((cmd, args))
}
