//! Mock settlement provider for tests; no network calls.

use super::{ProviderError, SellIntent, SettlementProvider};
use crate::domain::OrderId;
use crate::sync::OrderUpdate;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Mock provider serving canned order states and recording placed intents.
#[derive(Debug, Default)]
pub struct MockSettlementProvider {
    orders: Mutex<HashMap<String, OrderUpdate>>,
    placed: Mutex<Vec<SellIntent>>,
    next_order_ids: Mutex<Vec<String>>,
    fail_fetch: bool,
}

impl MockSettlementProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve this update when its order id is polled.
    pub fn with_order_update(self, update: OrderUpdate) -> Self {
        self.orders
            .lock()
            .unwrap()
            .insert(update.id.clone(), update);
        self
    }

    /// Queue an order id to hand out for the next placed sell.
    pub fn with_sell_order_id(self, order_id: impl Into<String>) -> Self {
        self.next_order_ids.lock().unwrap().push(order_id.into());
        self
    }

    /// Make every fetch fail with a network error.
    pub fn with_failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    /// Sell intents recorded so far.
    pub fn placed_intents(&self) -> Vec<SellIntent> {
        self.placed.lock().unwrap().clone()
    }
}

#[async_trait]
impl SettlementProvider for MockSettlementProvider {
    async fn fetch_order(
        &self,
        order_id: &OrderId,
        _access_token: &str,
    ) -> Result<OrderUpdate, ProviderError> {
        if self.fail_fetch {
            return Err(ProviderError::Network("mock fetch failure".to_string()));
        }
        self.orders
            .lock()
            .unwrap()
            .get(order_id.as_str())
            .cloned()
            .ok_or_else(|| ProviderError::OrderNotFound(order_id.to_string()))
    }

    async fn place_sell_order(&self, intent: &SellIntent) -> Result<OrderId, ProviderError> {
        self.placed.lock().unwrap().push(intent.clone());
        let mut ids = self.next_order_ids.lock().unwrap();
        let id = if ids.is_empty() {
            format!("mock-sell-{}", self.placed.lock().unwrap().len())
        } else {
            ids.remove(0)
        };
        Ok(OrderId::new(id))
    }
}
