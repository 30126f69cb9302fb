//! Common types for the gate.

use serde::Serialize;

/// Declared content kind of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Photo,
    Audio,
    Video,
    Voice,
    Document,
    Sticker,
}

impl ContentKind {
    /// Anything that is not plain text counts as media.
    pub fn is_media(&self) -> bool {
        !matches!(self, ContentKind::Text)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Photo => "photo",
            ContentKind::Audio => "audio",
            ContentKind::Video => "video",
            ContentKind::Voice => "voice",
            ContentKind::Document => "document",
            ContentKind::Sticker => "sticker",
        }
    }
}

/// A message received from the platform.
///
/// A conversation is identified by `user_id` (one ongoing thread per
/// external user).
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub user_id: String,
    /// Text content, or the caption for media messages.
    pub content: Option<String>,
    pub content_kind: ContentKind,
    pub timestamp: i64,
}

impl InboundMessage {
    /// Create a plain text message.
    pub fn text(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            content: Some(text.into()),
            content_kind: ContentKind::Text,
            timestamp: chrono_now(),
        }
    }

    /// Create a media message with an optional caption.
    pub fn media(user_id: impl Into<String>, kind: ContentKind, caption: Option<&str>) -> Self {
        Self {
            user_id: user_id.into(),
            content: caption.map(str::to_string),
            content_kind: kind,
            timestamp: chrono_now(),
        }
    }
}

fn chrono_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A parsed slash command, handled outside the credit gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: String,
}

/// Classification of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageClass {
    /// Plain non-empty text, eligible for the credit gate.
    Text(String),
    /// Carries an attachment; rejected before any credit check,
    /// regardless of caption.
    Media(ContentKind),
    /// Administrative directive; bypasses the credit gate.
    Command(Command),
}

/// Why the gate refused a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Media content is never relayed to the assistant.
    NotAllowed,
    /// Free-tier balance exhausted.
    InsufficientCredit,
    /// A reply for this conversation is still being composed.
    Busy,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::NotAllowed => "not_allowed",
            RejectReason::InsufficientCredit => "insufficient_credit",
            RejectReason::Busy => "busy",
        }
    }
}

/// Terminal outcome of handling one message.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The assistant answered; one credit was debited (unless the user
    /// is on the unlimited tier).
    Replied(String),
    /// Refused without touching credits (except the concurrent-debit
    /// loser, which refunds nothing because nothing was taken).
    Rejected(RejectReason),
    /// Provider failure or timeout; no credit was debited.
    Errored(String),
    /// Slash command, delegated back to the caller's command handler.
    Delegated(Command),
    /// Dropped without any outbound reply (blocked sender).
    Ignored,
}
