//! HTTP client for the settlement provider's order API.

use super::{ProviderError, SellIntent, SettlementProvider};
use crate::domain::OrderId;
use crate::sync::OrderUpdate;
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Settlement provider client over its REST API.
#[derive(Debug, Clone)]
pub struct HttpSettlementProvider {
    client: Client,
    base_url: String,
}

impl HttpSettlementProvider {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    fn backoff() -> ExponentialBackoff {
        ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        }
    }

    fn classify_status(status: reqwest::StatusCode) -> Option<backoff::Error<ProviderError>> {
        if status.as_u16() == 429 {
            return Some(backoff::Error::transient(ProviderError::RateLimited));
        }
        if status.is_server_error() {
            return Some(backoff::Error::transient(ProviderError::Http {
                status: status.as_u16(),
                message: "server error".to_string(),
            }));
        }
        if !status.is_success() {
            return Some(backoff::Error::permanent(ProviderError::Http {
                status: status.as_u16(),
                message: "client error".to_string(),
            }));
        }
        None
    }

    /// Providers wrap the order payload in a `data` envelope; tolerate both
    /// shapes.
    fn unwrap_envelope(value: serde_json::Value) -> serde_json::Value {
        match value {
            serde_json::Value::Object(mut map) => map
                .remove("data")
                .unwrap_or(serde_json::Value::Object(map)),
            other => other,
        }
    }
}

#[async_trait]
impl SettlementProvider for HttpSettlementProvider {
    async fn fetch_order(
        &self,
        order_id: &OrderId,
        access_token: &str,
    ) -> Result<OrderUpdate, ProviderError> {
        debug!(order_id = %order_id, "polling provider for order state");
        let url = format!("{}/api/orders/{}", self.base_url, order_id);

        let body = retry(Self::backoff(), || async {
            let response = self
                .client
                .get(&url)
                .bearer_auth(access_token)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(ProviderError::Network(e.to_string())))?;

            let status = response.status();
            if status.as_u16() == 404 {
                return Err(backoff::Error::permanent(ProviderError::OrderNotFound(
                    order_id.to_string(),
                )));
            }
            if let Some(err) = Self::classify_status(status) {
                return Err(err);
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(ProviderError::Parse(e.to_string())))
        })
        .await?;

        let payload = Self::unwrap_envelope(body);
        let mut update: OrderUpdate = serde_json::from_value(payload)
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        if update.id.is_empty() {
            update.id = order_id.to_string();
        }
        Ok(update)
    }

    async fn place_sell_order(&self, intent: &SellIntent) -> Result<OrderId, ProviderError> {
        debug!(
            symbol = %intent.symbol,
            quantity = %intent.quantity,
            "placing sell order with provider"
        );
        let url = format!("{}/api/orders/sell", self.base_url);
        let payload = serde_json::json!({
            "symbol": intent.symbol.as_str(),
            "quantity": intent.quantity,
            "currency": intent.currency.as_str(),
            "accountReference": intent.user_id.as_str(),
            "clientReference": intent.client_reference.to_string(),
        });

        let body = retry(Self::backoff(), || async {
            let response = self
                .client
                .post(&url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(ProviderError::Network(e.to_string())))?;

            if let Some(err) = Self::classify_status(response.status()) {
                return Err(err);
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(ProviderError::Parse(e.to_string())))
        })
        .await?;

        let payload = Self::unwrap_envelope(body);
        let id = payload
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProviderError::Parse("sell response missing order id".to_string()))?;
        Ok(OrderId::new(id))
    }
}
