//! Ledger schema.
//!
//! The schema is created on open with `CREATE TABLE IF NOT EXISTS`, so opening
//! an existing file is a no-op.  There is no versioning: the ledger has a
//! single table and it never changes shape.

use rusqlite::Connection;

/// Table holding every account.
pub const TABLE: &str = "cute_points";

const CREATE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS cute_points (
    internal_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    display_name TEXT,
    -- typeof check rejects the REAL that SQLite produces on i64 overflow
    points       INTEGER NOT NULL DEFAULT 0 CHECK (typeof(points) = 'integer'),
    external_id  INTEGER NOT NULL UNIQUE
);
"#;

/// Create the ledger table if it does not exist yet.
pub fn create(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(CREATE_SQL)
}
