//! HTTP feed clients with bounded request timeouts.

use super::{FeedError, FxFeed, PriceFeed};
use crate::domain::{Currency, Decimal, Symbol};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

fn feed_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

async fn fetch_json<T: for<'de> Deserialize<'de>>(
    client: &Client,
    url: &str,
) -> Result<T, FeedError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FeedError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FeedError::Http {
            status: status.as_u16(),
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| FeedError::Parse(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: Decimal,
}

/// Spot price client. One GET per lookup; the request timeout is the only
/// bound on how long a caller waits.
#[derive(Debug, Clone)]
pub struct HttpPriceFeed {
    client: Client,
    base_url: String,
}

impl HttpPriceFeed {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built; the request
    /// timeout is mandatory, there is no untimed fallback.
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: feed_client(timeout)?,
            base_url,
        })
    }
}

#[async_trait]
impl PriceFeed for HttpPriceFeed {
    async fn unit_price(&self, symbol: &Symbol, quote: &Currency) -> Result<Decimal, FeedError> {
        debug!(symbol = %symbol, quote = %quote, "fetching spot price");
        let url = format!(
            "{}/v1/prices?symbol={}&quote={}",
            self.base_url, symbol, quote
        );
        let body: PriceResponse = fetch_json(&self.client, &url).await?;
        Ok(body.price)
    }
}

#[derive(Debug, Deserialize)]
struct RateResponse {
    rate: Decimal,
}

/// Fiat exchange rate client, same single-fetch discipline.
#[derive(Debug, Clone)]
pub struct HttpFxFeed {
    client: Client,
    base_url: String,
}

impl HttpFxFeed {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: feed_client(timeout)?,
            base_url,
        })
    }
}

#[async_trait]
impl FxFeed for HttpFxFeed {
    async fn rate(&self, from: &Currency, to: &Currency) -> Result<Decimal, FeedError> {
        debug!(from = %from, to = %to, "fetching fx rate");
        let url = format!("{}/v1/rates?from={}&to={}", self.base_url, from, to);
        let body: RateResponse = fetch_json(&self.client, &url).await?;
        Ok(body.rate)
    }
}
