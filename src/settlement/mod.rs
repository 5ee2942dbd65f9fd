//! Order Settlement Processor: the only component that mutates the ledger.
//!
//! Completion events arrive out of order and duplicated, so settlement is
//! guarded by a durable per-order claim written in the same database
//! transaction as the holding mutation. A repeated completion event finds
//! the claim taken and becomes a no-op.

use crate::db::Repository;
use crate::domain::{
    Currency, Decimal, Direction, Holding, HoldingKey, OrderId, Symbol, TimeMs,
    TransactionRecord, UserId,
};
use crate::ledger::{HoldingStore, LedgerError};
use crate::provider::{ProviderError, SellIntent, SettlementProvider};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("quantity must be greater than zero")]
    InvalidQuantity,
    #[error("insufficient holding: requested {requested}, held {held}")]
    InsufficientHolding { requested: Decimal, held: Decimal },
    #[error("holding vanished before settlement of order {order_id}")]
    HoldingVanished { order_id: OrderId },
    #[error("order {order_id} completed without fill data")]
    MissingFillData { order_id: OrderId },
    #[error("order {order_id} is a {actual} order, expected {expected}")]
    UnexpectedDirection {
        order_id: OrderId,
        expected: Direction,
        actual: Direction,
    },
    #[error(transparent)]
    Ledger(LedgerError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Emitted after a settlement commits. The transport that fans this out to
/// clients (websocket, push, ...) is a collaborator's concern.
#[derive(Debug, Clone)]
pub struct SettlementEvent {
    pub order_id: OrderId,
    pub key: HoldingKey,
    pub direction: Direction,
    pub holding: Holding,
}

pub type SettlementHook = Arc<dyn Fn(&SettlementEvent) + Send + Sync>;

/// Outcome of delivering a completion event to the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// The fill was applied; here is the resulting position snapshot.
    Settled(Holding),
    /// This order had already been settled; nothing changed.
    AlreadySettled,
}

pub struct SettlementProcessor {
    repo: Arc<Repository>,
    store: Arc<HoldingStore>,
    provider: Arc<dyn SettlementProvider>,
    hooks: Vec<SettlementHook>,
}

impl SettlementProcessor {
    pub fn new(
        repo: Arc<Repository>,
        store: Arc<HoldingStore>,
        provider: Arc<dyn SettlementProvider>,
    ) -> Self {
        Self {
            repo,
            store,
            provider,
            hooks: Vec::new(),
        }
    }

    /// Register a callback invoked after each committed settlement.
    pub fn with_hook(mut self, hook: SettlementHook) -> Self {
        self.hooks.push(hook);
        self
    }

    fn emit(&self, event: SettlementEvent) {
        for hook in &self.hooks {
            hook(&event);
        }
    }

    /// Settlement key and fill amounts for a completed record.
    fn fill_of(
        record: &TransactionRecord,
    ) -> Result<(HoldingKey, Decimal, Decimal), SettlementError> {
        let (crypto_amount, fiat_amount, fiat_currency) = match (
            record.crypto_amount,
            record.fiat_amount,
            record.fiat_currency.as_ref(),
        ) {
            (Some(c), Some(f), Some(cur)) => (c, f, cur),
            _ => {
                return Err(SettlementError::MissingFillData {
                    order_id: record.order_id.clone(),
                })
            }
        };
        let key = HoldingKey::new(
            record.user_id.clone(),
            record.crypto_currency.clone(),
            fiat_currency.clone(),
        );
        Ok((key, crypto_amount, fiat_amount))
    }

    fn expect_direction(
        record: &TransactionRecord,
        expected: Direction,
    ) -> Result<(), SettlementError> {
        if record.direction != expected {
            return Err(SettlementError::UnexpectedDirection {
                order_id: record.order_id.clone(),
                expected,
                actual: record.direction,
            });
        }
        Ok(())
    }

    /// Apply a BUY completion to the ledger, at most once per order id.
    ///
    /// # Errors
    /// `MissingFillData` when the completed record lacks amounts, or
    /// ledger/database errors. A duplicate delivery is not an error.
    pub async fn on_buy_completed(
        &self,
        record: &TransactionRecord,
    ) -> Result<SettlementOutcome, SettlementError> {
        Self::expect_direction(record, Direction::Buy)?;
        let (key, crypto_amount, fiat_amount) = Self::fill_of(record)?;

        let _guard = self.store.lock_key(&key).await;
        let mut tx = self.repo.begin().await?;

        let now = TimeMs::now();
        if !self
            .repo
            .claim_settlement(&mut tx, &record.order_id, now)
            .await?
        {
            debug!(order_id = %record.order_id, "buy completion already settled, ignoring");
            return Ok(SettlementOutcome::AlreadySettled);
        }

        let holding = self
            .store
            .buy_fill_conn(&mut tx, &key, crypto_amount, fiat_amount, now)
            .await
            .map_err(SettlementError::Ledger)?;
        tx.commit().await?;

        info!(order_id = %record.order_id, key = %key, "buy settled");
        self.emit(SettlementEvent {
            order_id: record.order_id.clone(),
            key,
            direction: Direction::Buy,
            holding: holding.clone(),
        });
        Ok(SettlementOutcome::Settled(holding))
    }

    /// Apply a SELL completion to the ledger, at most once per order id.
    ///
    /// Sufficiency is re-validated here: the request-time check is only
    /// advisory, since the position may have changed while the provider was
    /// executing. A vanished or undersized holding at this point is a
    /// reconciliation alert, not a user error.
    ///
    /// # Errors
    /// `HoldingVanished` / `InsufficientHolding` on the race above (both
    /// logged at error level), `MissingFillData`, or ledger/database errors.
    pub async fn on_sell_completed(
        &self,
        record: &TransactionRecord,
    ) -> Result<SettlementOutcome, SettlementError> {
        Self::expect_direction(record, Direction::Sell)?;
        let (key, crypto_amount, _fiat_amount) = Self::fill_of(record)?;

        let _guard = self.store.lock_key(&key).await;
        let mut tx = self.repo.begin().await?;

        let now = TimeMs::now();
        if !self
            .repo
            .claim_settlement(&mut tx, &record.order_id, now)
            .await?
        {
            debug!(order_id = %record.order_id, "sell completion already settled, ignoring");
            return Ok(SettlementOutcome::AlreadySettled);
        }

        let holding = match self
            .store
            .sell_fill_conn(&mut tx, &key, crypto_amount, now)
            .await
        {
            Ok(holding) => holding,
            Err(LedgerError::HoldingNotFound) => {
                // Transaction drops here, releasing the claim for a retry
                // after an operator reconciles the position.
                error!(
                    order_id = %record.order_id,
                    key = %key,
                    "sell completed for a holding that no longer exists"
                );
                return Err(SettlementError::HoldingVanished {
                    order_id: record.order_id.clone(),
                });
            }
            Err(LedgerError::InsufficientHolding { requested, held }) => {
                error!(
                    order_id = %record.order_id,
                    key = %key,
                    requested = %requested,
                    held = %held,
                    "sell completed for more than the held quantity"
                );
                return Err(SettlementError::InsufficientHolding { requested, held });
            }
            Err(e) => return Err(SettlementError::Ledger(e)),
        };
        tx.commit().await?;

        info!(order_id = %record.order_id, key = %key, "sell settled");
        self.emit(SettlementEvent {
            order_id: record.order_id.clone(),
            key,
            direction: Direction::Sell,
            holding: holding.clone(),
        });
        Ok(SettlementOutcome::Settled(holding))
    }

    /// Validate a sell request against the current position, place the order
    /// with the provider, and register the SELL record to track. The holding
    /// itself is only mutated later, when the completion event arrives.
    ///
    /// # Errors
    /// `InvalidQuantity` / `InsufficientHolding` reject the request before
    /// anything leaves the process; provider and database errors propagate.
    pub async fn request_sell(
        &self,
        user_id: UserId,
        symbol: Symbol,
        currency: Currency,
        quantity: Decimal,
    ) -> Result<OrderId, SettlementError> {
        if !quantity.is_positive() {
            return Err(SettlementError::InvalidQuantity);
        }

        let key = HoldingKey::new(user_id.clone(), symbol.clone(), currency.clone());
        let held = self
            .store
            .get(&key)
            .await
            .map_err(SettlementError::Ledger)?
            .map(|h| h.quantity)
            .unwrap_or_else(Decimal::zero);
        if quantity > held {
            return Err(SettlementError::InsufficientHolding {
                requested: quantity,
                held,
            });
        }

        let intent = SellIntent {
            user_id: user_id.clone(),
            symbol: symbol.clone(),
            quantity,
            currency: currency.clone(),
            client_reference: uuid::Uuid::new_v4(),
        };
        let order_id = self.provider.place_sell_order(&intent).await?;

        let now = TimeMs::now();
        let mut record = TransactionRecord::new(
            order_id.clone(),
            user_id,
            Direction::Sell,
            symbol,
            now,
        );
        record.crypto_amount = Some(quantity);
        record.fiat_currency = Some(currency);
        if !self.repo.insert_transaction(&record).await? {
            // The provider handed back an id we already track; the stored
            // record stays authoritative and may not match this intent.
            warn!(
                order_id = %order_id,
                key = %key,
                "provider returned an already-tracked order id for a sell"
            );
        }

        info!(order_id = %order_id, key = %key, quantity = %quantity, "sell order placed");
        Ok(order_id)
    }
}
