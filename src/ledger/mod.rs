//! Holding Store: invariant-preserving mutations of per-user asset positions.
//!
//! Every mutation is an atomic read-modify-write on one
//! (user, symbol, currency) key. Operations on the same key serialize
//! through a per-key async lock; operations on different keys never share
//! a lock. The arithmetic invariants: quantity >= 0, total_invested >= 0,
//! and a position that reaches quantity zero is deleted rather than kept
//! as a zero row.

use crate::db::Repository;
use crate::domain::{Decimal, Holding, HoldingKey, TimeMs, UserId};
use sqlx::sqlite::SqliteConnection;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::warn;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("quantity must be greater than zero")]
    InvalidQuantity,
    #[error("fiat cost must not be negative")]
    InvalidCost,
    #[error("insufficient holding: requested {requested}, held {held}")]
    InsufficientHolding { requested: Decimal, held: Decimal },
    #[error("no holding exists for this position")]
    HoldingNotFound,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// The holdings ledger. The settlement processor is the only component
/// that calls the mutating operations.
pub struct HoldingStore {
    repo: Arc<Repository>,
    key_locks: StdMutex<HashMap<HoldingKey, Arc<AsyncMutex<()>>>>,
}

impl HoldingStore {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self {
            repo,
            key_locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Acquire the serialization lock for one holding key.
    ///
    /// The registry mutex is only held long enough to clone the key's
    /// lock; the await happens outside it.
    pub async fn lock_key(&self, key: &HoldingKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.key_locks.lock().expect("key lock registry poisoned");
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Apply a completed BUY fill to a key: create the position or fold the
    /// fill in with a weighted re-average.
    ///
    /// # Errors
    /// `InvalidQuantity` if `quantity <= 0`, `InvalidCost` if
    /// `fiat_cost < 0`, or a database error.
    pub async fn apply_buy_fill(
        &self,
        key: &HoldingKey,
        quantity: Decimal,
        fiat_cost: Decimal,
    ) -> Result<Holding, LedgerError> {
        let _guard = self.lock_key(key).await;
        let mut tx = self.repo.begin().await?;
        let holding = self
            .buy_fill_conn(&mut tx, key, quantity, fiat_cost, TimeMs::now())
            .await?;
        tx.commit().await?;
        Ok(holding)
    }

    /// Apply a completed SELL fill to a key: proportional reduction, never a
    /// re-average. Selling the entire quantity deletes the row and returns a
    /// zeroed snapshot.
    ///
    /// # Errors
    /// `InvalidQuantity`, `HoldingNotFound`, `InsufficientHolding` (an
    /// oversell is rejected outright, not truncated), or a database error.
    pub async fn apply_sell_fill(
        &self,
        key: &HoldingKey,
        quantity: Decimal,
    ) -> Result<Holding, LedgerError> {
        let _guard = self.lock_key(key).await;
        let mut tx = self.repo.begin().await?;
        let holding = self
            .sell_fill_conn(&mut tx, key, quantity, TimeMs::now())
            .await?;
        tx.commit().await?;
        Ok(holding)
    }

    /// Buy arithmetic on the caller's connection. The caller holds the key
    /// lock and owns the transaction boundary.
    pub(crate) async fn buy_fill_conn(
        &self,
        conn: &mut SqliteConnection,
        key: &HoldingKey,
        quantity: Decimal,
        fiat_cost: Decimal,
        at: TimeMs,
    ) -> Result<Holding, LedgerError> {
        if !quantity.is_positive() {
            return Err(LedgerError::InvalidQuantity);
        }
        if fiat_cost.is_negative() {
            return Err(LedgerError::InvalidCost);
        }

        let updated = match self.repo.get_holding_conn(conn, key).await? {
            None => Holding {
                key: key.clone(),
                quantity,
                average_cost: fiat_cost / quantity,
                total_invested: fiat_cost,
                updated_at: at,
            },
            Some(existing) => {
                let new_quantity = existing.quantity + quantity;
                let new_invested = existing.total_invested + fiat_cost;
                Holding {
                    key: key.clone(),
                    quantity: new_quantity,
                    average_cost: new_invested / new_quantity,
                    total_invested: new_invested,
                    updated_at: at,
                }
            }
        };

        self.repo.upsert_holding_conn(conn, &updated).await?;
        Ok(updated)
    }

    /// Sell arithmetic on the caller's connection. The caller holds the key
    /// lock and owns the transaction boundary.
    pub(crate) async fn sell_fill_conn(
        &self,
        conn: &mut SqliteConnection,
        key: &HoldingKey,
        quantity: Decimal,
        at: TimeMs,
    ) -> Result<Holding, LedgerError> {
        if !quantity.is_positive() {
            return Err(LedgerError::InvalidQuantity);
        }

        let existing = self
            .repo
            .get_holding_conn(conn, key)
            .await?
            .ok_or(LedgerError::HoldingNotFound)?;

        if quantity > existing.quantity {
            return Err(LedgerError::InsufficientHolding {
                requested: quantity,
                held: existing.quantity,
            });
        }

        let new_quantity = existing.quantity - quantity;
        if new_quantity.is_zero() {
            self.repo.delete_holding_conn(conn, key).await?;
            return Ok(Holding::zeroed(key.clone(), at));
        }

        let reduced_cost = existing.average_cost * quantity;
        let raw_invested = existing.total_invested - reduced_cost;
        if raw_invested.is_negative() {
            // Floored at zero to absorb rounding drift; a triggered clamp is
            // worth knowing about because it can hide systematic undercounting.
            warn!(
                key = %key,
                raw_invested = %raw_invested,
                "total_invested clamped to zero on sell"
            );
        }
        let new_invested = raw_invested.max(Decimal::zero());

        let updated = Holding {
            key: key.clone(),
            quantity: new_quantity,
            // average_cost is only recomputed on buys.
            average_cost: existing.average_cost,
            total_invested: new_invested,
            updated_at: at,
        };

        self.repo.upsert_holding_conn(conn, &updated).await?;
        Ok(updated)
    }

    /// Read-only snapshot of one position.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get(&self, key: &HoldingKey) -> Result<Option<Holding>, LedgerError> {
        Ok(self.repo.get_holding(key).await?)
    }

    /// Read-only snapshots of all of a user's positions.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Holding>, LedgerError> {
        Ok(self.repo.list_holdings_for_user(user_id).await?)
    }
}
