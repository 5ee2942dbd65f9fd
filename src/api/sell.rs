use crate::api::AppState;
use crate::domain::{Currency, Decimal, Symbol, UserId};
use crate::error::AppError;
use crate::settlement::SettlementError;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellRequest {
    pub user: String,
    pub symbol: String,
    pub currency: String,
    pub quantity: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SellResponse {
    pub order_id: String,
    pub status: String,
}

pub async fn request_sell(
    State(state): State<AppState>,
    Json(body): Json<SellRequest>,
) -> Result<Json<SellResponse>, AppError> {
    let user =
        UserId::from_str(&body.user).map_err(|_| AppError::BadRequest("Invalid user".into()))?;
    let symbol = Symbol::from_str(&body.symbol)
        .map_err(|_| AppError::BadRequest("Invalid symbol".into()))?;
    let currency = Currency::from_str(&body.currency)
        .map_err(|_| AppError::BadRequest("Invalid currency".into()))?;

    let order_id = state
        .processor
        .request_sell(user, symbol, currency, body.quantity)
        .await
        .map_err(|e| match e {
            SettlementError::InvalidQuantity => {
                AppError::BadRequest("Quantity must be greater than zero".into())
            }
            SettlementError::InsufficientHolding { requested, held } => AppError::BadRequest(
                format!("Insufficient holding: requested {}, held {}", requested, held),
            ),
            other => AppError::Internal(format!("Sell request failed: {}", other)),
        })?;

    Ok(Json(SellResponse {
        order_id: order_id.to_string(),
        status: "PENDING".to_string(),
    }))
}
