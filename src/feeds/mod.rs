//! Spot-price and foreign-exchange feeds.
//!
//! Both feeds are best-effort external lookups with a bounded timeout.
//! They report failure honestly; the fallback policy (FX rate 1.0, price
//! zero) belongs to the valuation layer, not here.

use crate::domain::{Currency, Decimal, Symbol};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod http;
pub mod mock;

pub use http::{HttpFxFeed, HttpPriceFeed};
pub use mock::{MockFxFeed, MockPriceFeed};

/// Spot price quote source for a crypto/fiat pair.
#[async_trait]
pub trait PriceFeed: Send + Sync + fmt::Debug {
    /// Current unit price of `symbol` in `quote`, single fetch, no retry.
    async fn unit_price(&self, symbol: &Symbol, quote: &Currency) -> Result<Decimal, FeedError>;
}

/// Fiat/fiat exchange rate source.
#[async_trait]
pub trait FxFeed: Send + Sync + fmt::Debug {
    /// Multiplier converting `from` amounts into `to`, single fetch.
    async fn rate(&self, from: &Currency, to: &Currency) -> Result<Decimal, FeedError>;
}

/// Error type for feed lookups. A timeout is just a failure; callers never
/// block on retries.
#[derive(Debug, Clone, Error)]
pub enum FeedError {
    #[error("network error: {0}")]
    Network(String),
    #[error("http error {status}")]
    Http { status: u16 },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("no quote available for {0}")]
    Unavailable(String),
}
