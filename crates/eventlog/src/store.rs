//! Persistent bounded log table.

use anyhow::Result;
use sqlx::{any::Any, Pool, Row};
use tokio::sync::Mutex;

use crate::{EventKind, LogEntry};

struct Accounting {
    total_bytes: i64,
    next_seq: i64,
}

/// sqlx-backed log store with a cumulative byte counter.
///
/// Sequence numbers are assigned by the store (portable across SQLite
/// and Postgres) and define eviction order together with the entry
/// timestamp: strictly oldest first.
pub struct LogStore {
    pool: Pool<Any>,
    ceiling_bytes: i64,
    accounting: Mutex<Accounting>,
}

impl LogStore {
    /// Open the store, creating the table if needed and recovering the
    /// byte counter and sequence from existing rows.
    pub async fn open(pool: Pool<Any>, ceiling_bytes: i64) -> Result<Self> {
        sqlx::query::<Any>(
            "CREATE TABLE IF NOT EXISTS event_log (
                seq INTEGER PRIMARY KEY,
                timestamp INTEGER NOT NULL,
                user_id TEXT NOT NULL,
                event_kind TEXT NOT NULL,
                payload_summary TEXT NOT NULL,
                entry_bytes INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        let row = sqlx::query(
            "SELECT COALESCE(SUM(entry_bytes), 0) AS total, COALESCE(MAX(seq), 0) AS max_seq
             FROM event_log",
        )
        .fetch_one(&pool)
        .await?;

        let total_bytes: i64 = row.try_get("total")?;
        let max_seq: i64 = row.try_get("max_seq")?;

        Ok(Self {
            pool,
            ceiling_bytes,
            accounting: Mutex::new(Accounting {
                total_bytes,
                next_seq: max_seq + 1,
            }),
        })
    }

    /// Append one entry, evicting the oldest rows until the total is
    /// back under the ceiling. The entry itself is written atomically.
    /// An entry that alone exceeds the ceiling is evicted right after
    /// being written; the ceiling holds after every append.
    pub async fn append(&self, entry: &LogEntry) -> Result<()> {
        let entry_bytes = entry.encoded_len();
        let mut accounting = self.accounting.lock().await;

        let seq = accounting.next_seq;
        sqlx::query::<Any>(
            "INSERT INTO event_log (seq, timestamp, user_id, event_kind, payload_summary, entry_bytes)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(seq)
        .bind(entry.timestamp)
        .bind(&entry.user_id)
        .bind(entry.event_kind.as_str())
        .bind(&entry.payload_summary)
        .bind(entry_bytes)
        .execute(&self.pool)
        .await?;

        accounting.next_seq += 1;
        accounting.total_bytes += entry_bytes;

        while accounting.total_bytes > self.ceiling_bytes {
            let Some((oldest_seq, oldest_bytes)) = self.oldest_row().await? else {
                break;
            };

            sqlx::query::<Any>("DELETE FROM event_log WHERE seq = $1")
                .bind(oldest_seq)
                .execute(&self.pool)
                .await?;

            accounting.total_bytes -= oldest_bytes;
            tracing::debug!(seq = oldest_seq, "Evicted oldest log entry");
        }

        Ok(())
    }

    async fn oldest_row(&self) -> Result<Option<(i64, i64)>> {
        let row = sqlx::query(
            "SELECT seq, entry_bytes FROM event_log ORDER BY timestamp ASC, seq ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| -> Result<(i64, i64)> {
            Ok((r.try_get("seq")?, r.try_get("entry_bytes")?))
        })
        .transpose()
    }

    /// Current cumulative size in bytes.
    pub async fn total_bytes(&self) -> i64 {
        self.accounting.lock().await.total_bytes
    }

    /// Most recent entries, newest first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<LogEntry>> {
        let rows = sqlx::query(
            "SELECT timestamp, user_id, event_kind, payload_summary
             FROM event_log ORDER BY timestamp DESC, seq DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| -> Result<LogEntry> {
                let kind_raw: String = r.try_get("event_kind")?;
                let event_kind = kind_raw
                    .parse::<EventKind>()
                    .map_err(|_| anyhow::anyhow!("unknown event kind: {kind_raw}"))?;

                Ok(LogEntry {
                    timestamp: r.try_get("timestamp")?,
                    user_id: r.try_get("user_id")?,
                    event_kind,
                    payload_summary: r.try_get("payload_summary")?,
                })
            })
            .collect()
    }

    /// Entries for one user, newest first.
    pub async fn for_user(&self, user_id: &str, limit: i64) -> Result<Vec<LogEntry>> {
        let rows = sqlx::query(
            "SELECT timestamp, user_id, event_kind, payload_summary
             FROM event_log WHERE user_id = $1 ORDER BY timestamp DESC, seq DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| -> Result<LogEntry> {
                let kind_raw: String = r.try_get("event_kind")?;
                let event_kind = kind_raw
                    .parse::<EventKind>()
                    .map_err(|_| anyhow::anyhow!("unknown event kind: {kind_raw}"))?;

                Ok(LogEntry {
                    timestamp: r.try_get("timestamp")?,
                    user_id: r.try_get("user_id")?,
                    event_kind,
                    payload_summary: r.try_get("payload_summary")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::any::AnyPoolOptions;

    async fn test_pool() -> Result<Pool<Any>> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Ok(pool)
    }

    fn entry_with_time(user_id: &str, timestamp: i64, summary: &str) -> LogEntry {
        LogEntry {
            timestamp,
            user_id: user_id.to_string(),
            event_kind: EventKind::MessageIn,
            payload_summary: summary.to_string(),
        }
    }

    #[tokio::test]
    async fn append_accumulates_bytes() -> Result<()> {
        let store = LogStore::open(test_pool().await?, 1024 * 1024).await?;

        store
            .append(&LogEntry::new("u1", EventKind::MessageIn, "hello"))
            .await?;
        store
            .append(&LogEntry::new("u1", EventKind::MessageOut, "reply"))
            .await?;

        assert!(store.total_bytes().await > 0);
        assert_eq!(store.recent(10).await?.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn total_never_exceeds_ceiling() -> Result<()> {
        let ceiling = 400;
        let store = LogStore::open(test_pool().await?, ceiling).await?;

        for i in 0..50 {
            store
                .append(&entry_with_time("u1", i, &format!("message number {i}")))
                .await?;
            assert!(
                store.total_bytes().await <= ceiling,
                "ceiling exceeded after append {i}"
            );
        }

        Ok(())
    }

    #[tokio::test]
    async fn eviction_is_oldest_first() -> Result<()> {
        let one = entry_with_time("u1", 100, "oldest");
        let two = entry_with_time("u1", 200, "middle");
        let three = entry_with_time("u1", 300, "newest");

        // Ceiling fits roughly two entries.
        let ceiling = one.encoded_len() + two.encoded_len() + 10;
        let store = LogStore::open(test_pool().await?, ceiling).await?;

        store.append(&one).await?;
        store.append(&two).await?;
        store.append(&three).await?;

        let remaining = store.recent(10).await?;
        let summaries: Vec<&str> = remaining
            .iter()
            .map(|e| e.payload_summary.as_str())
            .collect();

        assert!(!summaries.contains(&"oldest"), "oldest entry must go first");
        assert!(summaries.contains(&"newest"));

        Ok(())
    }

    #[tokio::test]
    async fn oversized_entry_never_leaves_total_over_ceiling() -> Result<()> {
        let ceiling = 50;
        let store = LogStore::open(test_pool().await?, ceiling).await?;

        store
            .append(&entry_with_time("u1", 1, "far too large for such a small ceiling"))
            .await?;

        assert!(store.total_bytes().await <= ceiling);
        assert!(store.recent(10).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn log_recovers_after_oversized_entry() -> Result<()> {
        let small = entry_with_time("u1", 2, "ok");
        let ceiling = small.encoded_len() + 10;
        let store = LogStore::open(test_pool().await?, ceiling).await?;

        store
            .append(&entry_with_time("u1", 1, &"x".repeat(2000)))
            .await?;
        store.append(&small).await?;

        let remaining = store.recent(10).await?;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].payload_summary, "ok");
        assert!(store.total_bytes().await <= ceiling);
        Ok(())
    }

    #[tokio::test]
    async fn counter_recovers_on_reopen() -> Result<()> {
        let pool = test_pool().await?;

        {
            let store = LogStore::open(pool.clone(), 1024 * 1024).await?;
            store
                .append(&LogEntry::new("u1", EventKind::MessageIn, "persisted"))
                .await?;
        }

        let reopened = LogStore::open(pool, 1024 * 1024).await?;
        assert!(reopened.total_bytes().await > 0);
        assert_eq!(reopened.recent(10).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn for_user_filters_entries() -> Result<()> {
        let store = LogStore::open(test_pool().await?, 1024 * 1024).await?;

        store
            .append(&LogEntry::new("u1", EventKind::MessageIn, "from u1"))
            .await?;
        store
            .append(&LogEntry::new("u2", EventKind::Rejected, "from u2"))
            .await?;

        let entries = store.for_user("u2", 10).await?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_kind, EventKind::Rejected);

        Ok(())
    }
}
