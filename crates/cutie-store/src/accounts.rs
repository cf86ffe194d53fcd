//! Ledger operations on [`UserAccount`] rows.
//!
//! There is no "not found" outcome: every lookup that misses creates the
//! account.  Increments are a single upsert statement, so two writers can
//! never lose each other's update even if they bypass the mutex that normally
//! serializes access to the connection.

use rusqlite::params;
use tracing::debug;

use crate::database::Database;
use crate::error::Result;
use crate::models::{ExternalId, LeaderboardEntry, UserAccount};

impl Database {
    // ------------------------------------------------------------------
    // Read-or-create
    // ------------------------------------------------------------------

    /// Return the account for `external_id`, creating it with zero points if
    /// it does not exist yet.
    ///
    /// `display_name` is only used on the creation path; an existing row keeps
    /// the name it was created with.
    pub fn get_or_create(&self, external_id: ExternalId, display_name: &str) -> Result<UserAccount> {
        let tx = self.conn().unchecked_transaction()?;

        let inserted = tx.execute(
            "INSERT INTO cute_points (display_name, points, external_id)
             VALUES (?1, 0, ?2)
             ON CONFLICT(external_id) DO NOTHING",
            params![display_name, external_id.0],
        )?;

        let account = tx.query_row(
            "SELECT internal_id, display_name, points, external_id
             FROM cute_points
             WHERE external_id = ?1",
            params![external_id.0],
            row_to_account,
        )?;

        tx.commit()?;

        if inserted > 0 {
            debug!(
                external_id = %external_id,
                internal_id = account.internal_id,
                "created ledger account"
            );
        }

        Ok(account)
    }

    // ------------------------------------------------------------------
    // Increment
    // ------------------------------------------------------------------

    /// Add `delta` (positive or negative) to the account's points and return
    /// the new total.
    ///
    /// The account is created on the fly if needed, using `display_name`.
    /// Overflowing `i64` fails with a constraint violation and leaves the row
    /// untouched.
    pub fn increment(&self, external_id: ExternalId, display_name: &str, delta: i64) -> Result<i64> {
        let points: i64 = self.conn().query_row(
            "INSERT INTO cute_points (display_name, points, external_id)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(external_id) DO UPDATE SET points = points + excluded.points
             RETURNING points",
            params![display_name, delta, external_id.0],
            |row| row.get(0),
        )?;

        debug!(external_id = %external_id, delta, points, "incremented points");

        Ok(points)
    }

    // ------------------------------------------------------------------
    // Ranking
    // ------------------------------------------------------------------

    /// Up to `n` accounts ordered by points, highest first.
    ///
    /// Ties have no secondary sort key; their relative order is whatever the
    /// storage engine returns.
    pub fn top_n(&self, n: usize) -> Result<Vec<LeaderboardEntry>> {
        let limit = i64::try_from(n).unwrap_or(i64::MAX);

        let mut stmt = self.conn().prepare(
            "SELECT display_name, points
             FROM cute_points
             ORDER BY points DESC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit], |row| {
            let display_name: Option<String> = row.get(0)?;
            Ok(LeaderboardEntry {
                display_name: display_name.unwrap_or_default(),
                points: row.get(1)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Number of accounts in the ledger.
    pub fn account_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM cute_points", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserAccount> {
    let display_name: Option<String> = row.get(1)?;

    Ok(UserAccount {
        internal_id: row.get(0)?,
        display_name: display_name.unwrap_or_default(),
        points: row.get(2)?,
        external_id: ExternalId(row.get(3)?),
    })
}
