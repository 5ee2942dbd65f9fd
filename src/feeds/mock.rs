//! Mock feeds for tests.

use super::{FeedError, FxFeed, PriceFeed};
use crate::domain::{Currency, Decimal, Symbol};
use async_trait::async_trait;
use std::collections::HashMap;

/// Mock price feed returning canned quotes.
#[derive(Debug, Default)]
pub struct MockPriceFeed {
    prices: HashMap<(String, String), Decimal>,
    failing: bool,
}

impl MockPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, symbol: &str, quote: &str, price: Decimal) -> Self {
        self.prices
            .insert((symbol.to_string(), quote.to_string()), price);
        self
    }

    /// Make every lookup fail, simulating a feed outage.
    pub fn with_outage(mut self) -> Self {
        self.failing = true;
        self
    }
}

#[async_trait]
impl PriceFeed for MockPriceFeed {
    async fn unit_price(&self, symbol: &Symbol, quote: &Currency) -> Result<Decimal, FeedError> {
        if self.failing {
            return Err(FeedError::Network("mock price outage".to_string()));
        }
        self.prices
            .get(&(symbol.as_str().to_string(), quote.as_str().to_string()))
            .copied()
            .ok_or_else(|| FeedError::Unavailable(format!("{}/{}", symbol, quote)))
    }
}

/// Mock FX feed returning canned rates.
#[derive(Debug, Default)]
pub struct MockFxFeed {
    rates: HashMap<(String, String), Decimal>,
    failing: bool,
}

impl MockFxFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, from: &str, to: &str, rate: Decimal) -> Self {
        self.rates
            .insert((from.to_string(), to.to_string()), rate);
        self
    }

    /// Make every lookup fail, simulating a feed outage.
    pub fn with_outage(mut self) -> Self {
        self.failing = true;
        self
    }
}

#[async_trait]
impl FxFeed for MockFxFeed {
    async fn rate(&self, from: &Currency, to: &Currency) -> Result<Decimal, FeedError> {
        if self.failing {
            return Err(FeedError::Network("mock fx outage".to_string()));
        }
        self.rates
            .get(&(from.as_str().to_string(), to.as_str().to_string()))
            .copied()
            .ok_or_else(|| FeedError::Unavailable(format!("{}/{}", from, to)))
    }
}
