//! # cutie-store
//!
//! The point ledger behind the cute points bot.
//!
//! A single SQLite table maps a user's platform identity to a display name
//! and a signed point total.  The crate exposes a synchronous `Database`
//! handle that owns one `rusqlite::Connection` and provides the ledger
//! operations: read-or-create, atomic increment and ranked top-N reads.

pub mod accounts;
pub mod database;
pub mod models;
pub mod schema;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
