//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `holdings.rs` - Holding row operations
//! - `transactions.rs` - Transaction record and settlement-claim operations
//!
//! Mutating holding and claim operations take `&mut SqliteConnection` so the
//! settlement processor can compose them into a single transaction.

mod holdings;
mod transactions;

use sqlx::sqlite::SqlitePool;
use sqlx::{Sqlite, Transaction};

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Begin a database transaction.
    ///
    /// # Errors
    /// Returns an error if a connection cannot be acquired.
    pub async fn begin(&self) -> Result<Transaction<'_, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }
}

/// Decode a required decimal column stored as a canonical string.
fn decode_decimal(column: &str, raw: &str) -> Result<crate::domain::Decimal, sqlx::Error> {
    crate::domain::Decimal::from_str_canonical(raw).map_err(|e| {
        sqlx::Error::Decode(format!("column {}: invalid decimal {:?}: {}", column, raw, e).into())
    })
}

/// Decode an optional decimal column stored as a canonical string.
fn decode_decimal_opt(
    column: &str,
    raw: Option<String>,
) -> Result<Option<crate::domain::Decimal>, sqlx::Error> {
    raw.map(|s| decode_decimal(column, &s)).transpose()
}
