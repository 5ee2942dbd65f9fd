use crate::api::AppState;
use crate::domain::{
    Decimal, Direction, OrderId, OrderStatus, Symbol, TimeMs, TransactionRecord, UserId,
};
use crate::error::AppError;
use crate::provider::ProviderError;
use crate::sync::{SyncError, SyncOutcome};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterOrderRequest {
    pub order_id: String,
    pub user: String,
    pub direction: Direction,
    pub crypto_currency: String,
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
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterOrderResponse {
    pub order_id: String,
    pub status: String,
    pub created: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDto {
    pub order_id: String,
    pub direction: String,
    pub crypto_currency: String,
    pub crypto_amount: Option<Decimal>,
    pub fiat_amount: Option<Decimal>,
    pub fiat_currency: Option<String>,
    pub status: String,
    pub status_reason: Option<String>,
    pub settled: bool,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl From<TransactionRecord> for TransactionDto {
    fn from(record: TransactionRecord) -> Self {
        TransactionDto {
            order_id: record.order_id.to_string(),
            direction: record.direction.as_str().to_string(),
            crypto_currency: record.crypto_currency.as_str().to_string(),
            crypto_amount: record.crypto_amount,
            fiat_amount: record.fiat_amount,
            fiat_currency: record.fiat_currency.map(|c| c.as_str().to_string()),
            status: record.status.as_str().to_string(),
            status_reason: record.status_reason,
            settled: record.settled_at.is_some(),
            created_at_ms: record.created_at.as_ms(),
            updated_at_ms: record.updated_at.as_ms(),
        }
    }
}

/// Register a provider order to track. Re-registering an existing order id
/// is acknowledged without touching the stored record.
pub async fn register_order(
    State(state): State<AppState>,
    Json(body): Json<RegisterOrderRequest>,
) -> Result<Json<RegisterOrderResponse>, AppError> {
    let order_id = OrderId::from_str(&body.order_id)
        .map_err(|_| AppError::BadRequest("Invalid order id".into()))?;
    let user =
        UserId::from_str(&body.user).map_err(|_| AppError::BadRequest("Invalid user".into()))?;
    let symbol = Symbol::from_str(&body.crypto_currency)
        .map_err(|_| AppError::BadRequest("Invalid crypto currency".into()))?;

    let now = TimeMs::now();
    let mut record = TransactionRecord::new(order_id.clone(), user, body.direction, symbol, now);
    record.crypto_amount = body.crypto_amount;
    record.fiat_amount = body.fiat_amount;
    record.fiat_currency = body.fiat_currency.map(crate::domain::Currency::new);
    record.network = body.network;
    record.wallet_address = body.wallet_address;

    let created = state
        .repo
        .insert_transaction(&record)
        .await
        .map_err(|e| AppError::Internal(format!("Order registration failed: {}", e)))?;

    if created {
        info!(order_id = %order_id, direction = %record.direction.as_str(), "order registered");
    }

    Ok(Json(RegisterOrderResponse {
        order_id: order_id.to_string(),
        status: OrderStatus::Pending.as_str().to_string(),
        created,
    }))
}

#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    pub user: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdersResponse {
    pub orders: Vec<TransactionDto>,
}

pub async fn list_orders(
    Query(params): Query<OrdersQuery>,
    State(state): State<AppState>,
) -> Result<Json<OrdersResponse>, AppError> {
    let user = UserId::from_str(&params.user)
        .map_err(|_| AppError::BadRequest("Invalid user".into()))?;

    let records = state
        .repo
        .list_transactions_for_user(&user)
        .await
        .map_err(|e| AppError::Internal(format!("Order query failed: {}", e)))?;

    Ok(Json(OrdersResponse {
        orders: records.into_iter().map(TransactionDto::from).collect(),
    }))
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".into()))
}

/// Pull the order's current state from the provider and merge it in.
pub async fn refresh_order(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TransactionDto>, AppError> {
    let token = bearer_token(&headers)?;
    let order_id =
        OrderId::from_str(&id).map_err(|_| AppError::BadRequest("Invalid order id".into()))?;

    let outcome = state
        .synchronizer
        .refresh_order(&order_id, token)
        .await
        .map_err(|e| match e {
            SyncError::Provider(ProviderError::OrderNotFound(_)) => {
                AppError::NotFound(format!("Order {} not found at provider", order_id))
            }
            other => AppError::Internal(format!("Order refresh failed: {}", other)),
        })?;

    match outcome {
        SyncOutcome::Applied { record, .. } => Ok(Json(record.into())),
        SyncOutcome::UnknownOrder => Err(AppError::NotFound(format!(
            "Order {} is not tracked",
            order_id
        ))),
    }
}
