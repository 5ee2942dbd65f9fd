//! External settlement provider client: order status polling and sell-order
//! placement.

use crate::domain::{Currency, Decimal, OrderId, Symbol, UserId};
use crate::sync::OrderUpdate;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod http;
pub mod mock;

pub use http::HttpSettlementProvider;
pub use mock::MockSettlementProvider;

/// A validated sell intent emitted toward the provider. The provider
/// answers with the external order id we then track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellIntent {
    pub user_id: UserId,
    pub symbol: Symbol,
    pub quantity: Decimal,
    pub currency: Currency,
    /// Our reference attached to the provider order, for support tooling.
    pub client_reference: uuid::Uuid,
}

/// Client for the external settlement provider.
///
/// Order placement/network transfer mechanics live entirely on the provider
/// side; this trait only covers the call/response contracts the core needs.
#[async_trait]
pub trait SettlementProvider: Send + Sync + fmt::Debug {
    /// Fetch the current state of an order (authenticated poll path).
    ///
    /// The access token is obtained and refreshed by a collaborator and
    /// injected per call.
    async fn fetch_order(
        &self,
        order_id: &OrderId,
        access_token: &str,
    ) -> Result<OrderUpdate, ProviderError>;

    /// Place a sell order and return the external order id to track.
    async fn place_sell_order(&self, intent: &SellIntent) -> Result<OrderId, ProviderError>;
}

/// Error type for settlement provider calls.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),
    #[error("http error {status}: {message}")]
    Http { status: u16, message: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("order not found: {0}")]
    OrderNotFound(String),
    #[error("rate limited")]
    RateLimited,
}
