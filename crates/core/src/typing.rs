//! Typing-state controller.
//!
//! Ephemeral, per-conversation state: `idle` or `composing`. At most
//! one in-flight provider call per conversation; a second message
//! arriving while the slot is held is rejected as busy rather than
//! interleaving replies.

use std::sync::Arc;

use dashmap::DashMap;

/// Typing state of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingState {
    Idle,
    Composing,
}

/// Tracks which conversations currently have a reply being composed.
#[derive(Clone, Default)]
pub struct TypingController {
    slots: Arc<DashMap<String, ()>>,
}

impl TypingController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to enter `composing` for a conversation.
    ///
    /// Returns `None` if a reply is already in flight. The returned
    /// guard restores `idle` on drop, so the slot is released on every
    /// exit path, including failure and timeout.
    pub fn begin(&self, conversation_id: &str) -> Option<TypingGuard> {
        use dashmap::mapref::entry::Entry;

        match self.slots.entry(conversation_id.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(TypingGuard {
                    slots: Arc::clone(&self.slots),
                    conversation_id: conversation_id.to_string(),
                })
            }
        }
    }

    pub fn state(&self, conversation_id: &str) -> TypingState {
        if self.slots.contains_key(conversation_id) {
            TypingState::Composing
        } else {
            TypingState::Idle
        }
    }
}

/// Holds a conversation in `composing` until dropped.
pub struct TypingGuard {
    slots: Arc<DashMap<String, ()>>,
    conversation_id: String,
}

impl Drop for TypingGuard {
    fn drop(&mut self) {
        self.slots.remove(&self.conversation_id);
    }
}
