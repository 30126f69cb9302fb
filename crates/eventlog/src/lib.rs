//! Append-only event log with a hard byte ceiling.
//!
//! [`LogStore`] owns the persistent table and the size accounting:
//! every append may evict the oldest entries until the cumulative
//! size is back under the ceiling. [`BoundedLogSink`] is the handle
//! message handlers hold: appends go over a channel to a writer task,
//! so logging never blocks or fails the caller.

pub mod sink;
pub mod store;

pub use sink::{BoundedLogSink, LogWriterHandle};
pub use store::LogStore;

use serde::{Deserialize, Serialize};

/// Default storage ceiling: 1 MiB.
pub const DEFAULT_LOG_CEILING_BYTES: i64 = 1024 * 1024;

/// Payload summaries are clipped to this many characters before storage.
const MAX_SUMMARY_CHARS: usize = 256;

/// Kind of a logged event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    MessageIn,
    MessageOut,
    Rejected,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::MessageIn => "message_in",
            EventKind::MessageOut => "message_out",
            EventKind::Rejected => "rejected",
            EventKind::Error => "error",
        }
    }
}

impl std::str::FromStr for EventKind {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message_in" => Ok(EventKind::MessageIn),
            "message_out" => Ok(EventKind::MessageOut),
            "rejected" => Ok(EventKind::Rejected),
            "error" => Ok(EventKind::Error),
            _ => Err(()),
        }
    }
}

/// One event log row.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LogEntry {
    pub timestamp: i64,
    pub user_id: String,
    pub event_kind: EventKind,
    pub payload_summary: String,
}

impl LogEntry {
    /// Build an entry stamped with the current time. The summary is
    /// clipped so a single oversized payload cannot blow the ceiling.
    pub fn new(user_id: impl Into<String>, event_kind: EventKind, summary: &str) -> Self {
        let payload_summary = if summary.chars().count() > MAX_SUMMARY_CHARS {
            summary.chars().take(MAX_SUMMARY_CHARS).collect()
        } else {
            summary.to_string()
        };

        Self {
            timestamp: chrono::Utc::now().timestamp(),
            user_id: user_id.into(),
            event_kind,
            payload_summary,
        }
    }

    /// Approximate storage cost of this entry in bytes.
    pub(crate) fn encoded_len(&self) -> i64 {
        serde_json::to_string(self).map(|s| s.len() as i64).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_round_trips_through_str() {
        for kind in [
            EventKind::MessageIn,
            EventKind::MessageOut,
            EventKind::Rejected,
            EventKind::Error,
        ] {
            assert_eq!(kind.as_str().parse::<EventKind>(), Ok(kind));
        }
    }

    #[test]
    fn oversized_summary_is_clipped() {
        let long = "x".repeat(10_000);
        let entry = LogEntry::new("u1", EventKind::MessageIn, &long);
        assert_eq!(entry.payload_summary.chars().count(), 256);
    }

    #[test]
    fn encoded_len_tracks_summary_size() {
        let small = LogEntry::new("u1", EventKind::MessageIn, "hi");
        let large = LogEntry::new("u1", EventKind::MessageIn, &"y".repeat(200));
        assert!(large.encoded_len() > small.encoded_len());
    }
}
