//! # SQLite backend
//!
//! This module contains "low-level" SQLite database interactions, and [`SqliteDatabase`], which composes them into
//! the backend traits.
//!
//! All these interactions are simple functions (rather than stateful structs) that accept a `&mut SqliteConnection`
//! argument. Callers can obtain a connection from a pool, or create an atomic transaction as the need arises and call
//! through to the functions without any other changes. A transaction is the engine's unit of work.
//!
//! SQLite allows one writer at a time. A transaction that reads before it writes can fail outright when it tries to
//! upgrade its lock, so every multi-statement unit of work here issues its first write before any read. Writers then
//! simply queue on the busy handler.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

mod cas;
mod sqlite_impl;

pub mod catalog;
pub mod holds;
pub mod orders;
pub mod payments;
pub mod scans;
pub mod tickets;

pub use cas::ConditionalUpdate;
pub use sqlite_impl::SqliteDatabase;

const SQLITE_DB_URL: &str = "sqlite://data/box_office.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

pub fn db_url() -> String {
    let result = env::var("BXO_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ BXO_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
