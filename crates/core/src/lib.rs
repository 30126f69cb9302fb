//! Session & credit gate for the Bella conversational relay.
//!
//! This crate decides, for every inbound message, whether to process
//! it: classification (text / media / command), the per-user credit
//! gate against the ledger, the typing-state machine, and the bounded
//! call to the AI provider. Platform wiring (Telegram) lives in the
//! binary; persistence lives in `bella-ledger` and `bella-eventlog`.

pub mod classify;
pub mod error;
pub mod gate;
pub mod provider;
pub mod types;
pub mod typing;

pub use classify::{classify, parse_command};
pub use error::GateError;
pub use gate::{GateConfig, PlatformActions, SessionGate};
pub use provider::{AssistantProvider, OpenRouterProvider, ProviderConfig, ProviderError};
pub use types::{Command, ContentKind, InboundMessage, MessageClass, Outcome, RejectReason};
pub use typing::{TypingController, TypingGuard, TypingState};
