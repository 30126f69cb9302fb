//! Non-blocking handle over the log store.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::{LogEntry, LogStore};

const CHANNEL_CAPACITY: usize = 256;

/// Cheap, cloneable logging handle.
///
/// `record` never blocks and never surfaces an error: entries are
/// handed to a writer task over a bounded channel, and a full channel
/// or a failed write only produces a warning. Message handling is
/// never aborted by the log.
#[derive(Clone)]
pub struct BoundedLogSink {
    tx: mpsc::Sender<LogEntry>,
}

/// Join handle for the writer task; used for clean shutdown and to
/// make tests deterministic.
pub struct LogWriterHandle {
    handle: JoinHandle<()>,
}

impl BoundedLogSink {
    /// Spawn the writer task over `store`.
    pub fn spawn(store: Arc<LogStore>) -> (Self, LogWriterHandle) {
        let (tx, mut rx) = mpsc::channel::<LogEntry>(CHANNEL_CAPACITY);

        let handle = tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                if let Err(e) = store.append(&entry).await {
                    warn!(error = %e, "Failed to write log entry, dropping it");
                }
            }
        });

        (Self { tx }, LogWriterHandle { handle })
    }

    /// Queue an entry for writing. Always succeeds from the caller's
    /// perspective; on a full channel the entry is dropped with a warning.
    pub fn record(&self, entry: LogEntry) {
        if let Err(e) = self.tx.try_send(entry) {
            warn!(error = %e, "Log channel unavailable, dropping entry");
        }
    }
}

impl LogWriterHandle {
    /// Wait for the writer to drain. All sink clones must be dropped
    /// first, otherwise this waits forever.
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Log writer task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventKind;
    use anyhow::Result;
    use sqlx::any::AnyPoolOptions;

    async fn test_store() -> Result<Arc<LogStore>> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Ok(Arc::new(LogStore::open(pool, 1024 * 1024).await?))
    }

    #[tokio::test]
    async fn recorded_entries_are_flushed_on_join() -> Result<()> {
        let store = test_store().await?;
        let (sink, writer) = BoundedLogSink::spawn(Arc::clone(&store));

        sink.record(LogEntry::new("u1", EventKind::MessageIn, "hello"));
        sink.record(LogEntry::new("u1", EventKind::MessageOut, "reply"));

        drop(sink);
        writer.join().await;

        assert_eq!(store.recent(10).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn record_survives_dead_writer() -> Result<()> {
        let store = test_store().await?;
        let (sink, writer) = BoundedLogSink::spawn(store);

        writer.handle.abort();
        // Must not panic or error even though nothing will consume it.
        sink.record(LogEntry::new("u1", EventKind::Error, "lost"));

        Ok(())
    }
}
