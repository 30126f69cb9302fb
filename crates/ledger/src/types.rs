//! Ledger record types.

use serde::{Deserialize, Serialize};

/// Connection state of a user, as last reported by the platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Blocked,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Blocked => "blocked",
        }
    }
}

impl std::str::FromStr for ConnectionStatus {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "connected" => Ok(ConnectionStatus::Connected),
            "disconnected" => Ok(ConnectionStatus::Disconnected),
            "blocked" => Ok(ConnectionStatus::Blocked),
            _ => Err(()),
        }
    }
}

/// Membership tier. `Unlimited` bypasses the credit gate entirely.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Paid,
    Unlimited,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Paid => "paid",
            Tier::Unlimited => "unlimited",
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "paid" => Ok(Tier::Paid),
            "unlimited" => Ok(Tier::Unlimited),
            _ => Err(()),
        }
    }
}

/// Stable external identity plus connection state. Created on first
/// contact, never deleted.
#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    pub user_id: String,
    pub connection_status: ConnectionStatus,
    pub last_seen: i64,
}

/// Credit state for a user, one-to-one with [`UserRecord`].
///
/// Invariant: `credit_balance >= 0` at all times. The store enforces
/// this by rejecting any debit that would go negative.
#[derive(Debug, Clone, Serialize)]
pub struct MembershipRecord {
    pub user_id: String,
    pub membership_id: String,
    pub tier: Tier,
    pub credit_balance: i64,
    pub last_credit_update: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_round_trips_through_str() {
        for tier in [Tier::Free, Tier::Paid, Tier::Unlimited] {
            assert_eq!(tier.as_str().parse::<Tier>(), Ok(tier));
        }
    }

    #[test]
    fn connection_status_round_trips_through_str() {
        for status in [
            ConnectionStatus::Connected,
            ConnectionStatus::Disconnected,
            ConnectionStatus::Blocked,
        ] {
            assert_eq!(status.as_str().parse::<ConnectionStatus>(), Ok(status));
        }
    }

    #[test]
    fn unknown_tier_is_rejected() {
        assert!("silver".parse::<Tier>().is_err());
    }
}
