//! Transaction State Synchronizer.
//!
//! Webhook (push) and poll (pull) deliveries of provider order state both
//! funnel into [`StatusSynchronizer::apply_update`], so concurrent writers
//! resolve through one merge + transition function: statuses never regress
//! out of a terminal state, and partial payloads only enrich fields they
//! actually carry. Updates for the same order id serialize through a
//! per-order lock, so each writer merges against the prior writer's
//! committed record rather than a stale snapshot.

use crate::db::Repository;
use crate::domain::{Currency, Decimal, Direction, OrderStatus, OrderId, TimeMs, TransactionRecord};
use crate::provider::{ProviderError, SettlementProvider};
use crate::settlement::{SettlementError, SettlementOutcome, SettlementProcessor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};

/// One provider-reported order state, from either delivery path.
///
/// Every field except `id` is optional; the provider's payloads are
/// loosely typed and routinely partial.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub status_reason: Option<String>,
    #[serde(default)]
    pub crypto_amount: Option<Decimal>,
    #[serde(default)]
    pub fiat_amount: Option<Decimal>,
    #[serde(default)]
    pub fiat_currency: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub wallet_link: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Result of applying one provider update.
#[derive(Debug)]
pub enum SyncOutcome {
    /// The record was merged and persisted; if the merge drove the record
    /// to Completed, the settlement outcome is included.
    Applied {
        record: TransactionRecord,
        settlement: Option<SettlementOutcome>,
    },
    /// No record exists for this order id; the update was acknowledged and
    /// dropped.
    UnknownOrder,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Settlement(#[from] SettlementError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

pub struct StatusSynchronizer {
    repo: Arc<Repository>,
    processor: Arc<SettlementProcessor>,
    provider: Arc<dyn SettlementProvider>,
    order_locks: StdMutex<HashMap<OrderId, Arc<AsyncMutex<()>>>>,
}

impl StatusSynchronizer {
    pub fn new(
        repo: Arc<Repository>,
        processor: Arc<SettlementProcessor>,
        provider: Arc<dyn SettlementProvider>,
    ) -> Self {
        Self {
            repo,
            processor,
            provider,
            order_locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Acquire the serialization lock for one order id. Same discipline as
    /// the holding store's key locks: the registry mutex is only held long
    /// enough to clone the order's lock.
    async fn lock_order(&self, order_id: &OrderId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .order_locks
                .lock()
                .expect("order lock registry poisoned");
            locks
                .entry(order_id.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Merge one provider update into the stored record and react to the
    /// resulting status.
    ///
    /// Regressions out of a terminal status are refused (warn log, stored
    /// status stays authoritative) while non-status fields from the same
    /// payload still merge. Webhook and poll deliveries for the same order
    /// serialize on a per-order lock, so the load-merge-persist sequence of
    /// one writer never runs against another writer's uncommitted snapshot.
    /// A record that is Completed after the merge is handed to the
    /// settlement processor; its durable claim absorbs duplicate deliveries.
    ///
    /// # Errors
    /// Database errors, or settlement errors when applying a completion.
    pub async fn apply_update(&self, update: &OrderUpdate) -> Result<SyncOutcome, SyncError> {
        let order_id = OrderId::new(update.id.clone());
        let _guard = self.lock_order(&order_id).await;
        let Some(stored) = self.repo.get_transaction(&order_id).await? else {
            warn!(order_id = %order_id, "update for unknown order, dropping");
            return Ok(SyncOutcome::UnknownOrder);
        };

        let mut merged = stored.clone();
        merge_fields(&mut merged, update);

        if let Some(raw_status) = update.status.as_deref() {
            let incoming = OrderStatus::normalize(raw_status);
            if stored.status.can_transition_to(incoming) {
                merged.status = incoming;
            } else {
                warn!(
                    order_id = %order_id,
                    stored = %stored.status,
                    incoming = %incoming,
                    raw = raw_status,
                    "refusing status regression, stored record is authoritative"
                );
            }
        }

        merged.updated_at = TimeMs::now();
        self.repo.update_transaction(&merged).await?;
        debug!(order_id = %order_id, status = %merged.status, "order update merged");

        let settlement = if merged.status == OrderStatus::Completed {
            let outcome = match merged.direction {
                Direction::Buy => self.processor.on_buy_completed(&merged).await?,
                Direction::Sell => self.processor.on_sell_completed(&merged).await?,
            };
            Some(outcome)
        } else {
            None
        };

        Ok(SyncOutcome::Applied {
            record: merged,
            settlement,
        })
    }

    /// Pull path: fetch the order from the provider with the injected
    /// access token and funnel the result through [`apply_update`].
    ///
    /// # Errors
    /// Provider errors, plus everything `apply_update` can return.
    ///
    /// [`apply_update`]: StatusSynchronizer::apply_update
    pub async fn refresh_order(
        &self,
        order_id: &OrderId,
        access_token: &str,
    ) -> Result<SyncOutcome, SyncError> {
        let update = self.provider.fetch_order(order_id, access_token).await?;
        self.apply_update(&update).await
    }
}

/// Copy the non-status fields a payload actually carries; absent fields
/// leave the stored value untouched.
fn merge_fields(record: &mut TransactionRecord, update: &OrderUpdate) {
    if let Some(amount) = update.crypto_amount {
        record.crypto_amount = Some(amount);
    }
    if let Some(amount) = update.fiat_amount {
        record.fiat_amount = Some(amount);
    }
    if let Some(currency) = update.fiat_currency.as_deref() {
        record.fiat_currency = Some(Currency::new(currency));
    }
    if let Some(network) = update.network.as_deref() {
        record.network = Some(network.to_string());
    }
    if let Some(address) = update.wallet_address.as_deref() {
        record.wallet_address = Some(address.to_string());
    }
    if let Some(link) = update.wallet_link.as_deref() {
        record.wallet_link = Some(link.to_string());
    }
    if let Some(reason) = update.status_reason.as_deref() {
        record.status_reason = Some(reason.to_string());
    }
    if let Some(metadata) = update.metadata.as_ref() {
        record.provider_metadata = Some(metadata.clone());
    }
}
