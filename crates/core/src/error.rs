//! Error taxonomy for the gate.

use thiserror::Error;

/// Errors that abort processing of a single message.
///
/// User-visible rejections (media, insufficient credit, busy) are not
/// errors; they travel as [`crate::Outcome::Rejected`]. Provider
/// failures are recoverable and surface as [`crate::Outcome::Errored`].
#[derive(Debug, Error)]
pub enum GateError {
    /// Malformed or empty message. Dropped without a user-facing reply,
    /// never charged.
    #[error("invalid message")]
    InvalidMessage,

    /// Ledger read/write failure. Fatal to this message: a debit
    /// decision must never be silently lost.
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}
