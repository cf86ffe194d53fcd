//! Domain model structs persisted in the ledger.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ExternalId
// ---------------------------------------------------------------------------

/// Stable user identity assigned by the chat platform (a Discord snowflake).
///
/// Snowflakes travel as decimal strings on the wire and are stored as SQLite
/// `INTEGER`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExternalId(pub i64);

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ExternalId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self)
    }
}

impl From<i64> for ExternalId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// UserAccount
// ---------------------------------------------------------------------------

/// One row of the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserAccount {
    /// Surrogate key, auto-assigned.  Not meaningful outside the store.
    pub internal_id: i64,
    /// Display name recorded when the account was created.
    pub display_name: String,
    /// Signed point total.  No floor, no ceiling.
    pub points: i64,
    /// Platform identity; unique across the table.
    pub external_id: ExternalId,
}

// ---------------------------------------------------------------------------
// LeaderboardEntry
// ---------------------------------------------------------------------------

/// Projection returned by [`Database::top_n`](crate::Database::top_n).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub display_name: String,
    pub points: i64,
}
