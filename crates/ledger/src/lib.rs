//! Persistent ledger for user identity, connection status and credits.
//!
//! Two tables, one-to-one by `user_id`: `users` (identity + connection
//! status) and `memberships` (tier + credit balance). The debit path is
//! the only operation with an atomicity requirement; everything else is
//! plain read/write.

pub mod store;
pub mod types;

/// Credits granted to a newly seen user.
pub const DEFAULT_STARTING_GRANT: i64 = 300;

pub use store::{DebitOutcome, LedgerStore};
pub use types::{ConnectionStatus, MembershipRecord, Tier, UserRecord};
