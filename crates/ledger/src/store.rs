//! sqlx-backed ledger store.
//!
//! Works against the `Any` driver so production can run Postgres while
//! tests use in-memory SQLite. Row mapping is manual (`try_get`) for
//! cross-database compatibility.

use anyhow::Result;
use sqlx::{any::Any, Pool, Row};
use uuid::Uuid;

use crate::types::{ConnectionStatus, MembershipRecord, Tier, UserRecord};

/// Result of a debit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    /// Debit applied; carries the remaining balance.
    Debited(i64),
    /// Balance would have gone negative; nothing was changed.
    Insufficient,
}

#[derive(Clone, Debug)]
pub struct LedgerStore {
    pool: Pool<Any>,
    starting_grant: i64,
}

impl LedgerStore {
    pub fn new(pool: Pool<Any>, starting_grant: i64) -> Self {
        Self {
            pool,
            starting_grant,
        }
    }

    /// Create the ledger tables if they do not exist yet.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query::<Any>(
            "CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                connection_status TEXT NOT NULL,
                last_seen INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query::<Any>(
            "CREATE TABLE IF NOT EXISTS memberships (
                user_id TEXT PRIMARY KEY REFERENCES users(user_id),
                membership_id TEXT NOT NULL UNIQUE,
                tier TEXT NOT NULL,
                credit_balance INTEGER NOT NULL,
                last_credit_update INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch the user and membership rows, creating both with defaults
    /// (tier `free`, starting grant) if this is the first contact.
    ///
    /// This is the only implicit-creation path in the system.
    pub async fn get_or_create(&self, user_id: &str) -> Result<(UserRecord, MembershipRecord)> {
        if let Some(user) = self.get_user(user_id).await? {
            let membership = self
                .get_membership(user_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("membership row missing for user {user_id}"))?;
            return Ok((user, membership));
        }

        let now = chrono::Utc::now().timestamp();
        let membership_id = Uuid::new_v4().to_string();

        sqlx::query::<Any>(
            "INSERT INTO users (user_id, connection_status, last_seen) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(ConnectionStatus::Connected.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        sqlx::query::<Any>(
            "INSERT INTO memberships (user_id, membership_id, tier, credit_balance, last_credit_update)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user_id)
        .bind(&membership_id)
        .bind(Tier::Free.as_str())
        .bind(self.starting_grant)
        .bind(now)
        .execute(&self.pool)
        .await?;

        tracing::info!(user_id, membership_id, "Created ledger records for new user");

        let user = self
            .get_user(user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("failed to create user {user_id}"))?;
        let membership = self
            .get_membership(user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("failed to create membership for {user_id}"))?;

        Ok((user, membership))
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query(
            "SELECT user_id, connection_status, last_seen FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| -> Result<UserRecord> {
            let status_raw: String = r.try_get("connection_status")?;
            let connection_status = status_raw
                .parse::<ConnectionStatus>()
                .map_err(|_| anyhow::anyhow!("unknown connection status: {status_raw}"))?;

            Ok(UserRecord {
                user_id: r.try_get("user_id")?,
                connection_status,
                last_seen: r.try_get("last_seen")?,
            })
        })
        .transpose()
    }

    pub async fn get_membership(&self, user_id: &str) -> Result<Option<MembershipRecord>> {
        let row = sqlx::query(
            "SELECT user_id, membership_id, tier, credit_balance, last_credit_update
             FROM memberships WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| -> Result<MembershipRecord> {
            let tier_raw: String = r.try_get("tier")?;
            let tier = tier_raw
                .parse::<Tier>()
                .map_err(|_| anyhow::anyhow!("unknown tier: {tier_raw}"))?;

            Ok(MembershipRecord {
                user_id: r.try_get("user_id")?,
                membership_id: r.try_get("membership_id")?,
                tier,
                credit_balance: r.try_get("credit_balance")?,
                last_credit_update: r.try_get("last_credit_update")?,
            })
        })
        .transpose()
    }

    /// Debit `amount` credits if the balance covers it.
    ///
    /// Single conditional UPDATE so that two concurrent debits against a
    /// balance that only covers one cannot both succeed. No row is ever
    /// left with a negative balance.
    pub async fn debit(&self, user_id: &str, amount: i64) -> Result<DebitOutcome> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query::<Any>(
            "UPDATE memberships
             SET credit_balance = credit_balance - $1, last_credit_update = $2
             WHERE user_id = $3 AND credit_balance >= $1",
        )
        .bind(amount)
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(DebitOutcome::Insufficient);
        }

        let membership = self
            .get_membership(user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("membership row vanished for {user_id}"))?;

        tracing::debug!(
            user_id,
            balance = membership.credit_balance,
            "Debited {amount} credit(s)"
        );
        Ok(DebitOutcome::Debited(membership.credit_balance))
    }

    /// Top up a user's balance (external top-up events).
    pub async fn credit(&self, user_id: &str, amount: i64) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query::<Any>(
            "UPDATE memberships
             SET credit_balance = credit_balance + $1, last_credit_update = $2
             WHERE user_id = $3",
        )
        .bind(amount)
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_tier(&self, user_id: &str, tier: Tier) -> Result<()> {
        sqlx::query::<Any>("UPDATE memberships SET tier = $1 WHERE user_id = $2")
            .bind(tier.as_str())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Record a connect/disconnect/block event and refresh `last_seen`.
    pub async fn set_connection_status(
        &self,
        user_id: &str,
        status: ConnectionStatus,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query::<Any>(
            "UPDATE users SET connection_status = $1, last_seen = $2 WHERE user_id = $3",
        )
        .bind(status.as_str())
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        tracing::debug!(user_id, status = status.as_str(), "Updated connection status");
        Ok(())
    }

    /// Refresh `last_seen` for an inbound message without touching status.
    pub async fn touch(&self, user_id: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query::<Any>("UPDATE users SET last_seen = $1 WHERE user_id = $2")
            .bind(now)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
