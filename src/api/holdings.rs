use crate::api::AppState;
use crate::domain::{Holding, UserId};
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Deserialize)]
pub struct HoldingsQuery {
    pub user: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingDto {
    pub symbol: String,
    pub currency: String,
    pub quantity: crate::domain::Decimal,
    pub average_cost: crate::domain::Decimal,
    pub total_invested: crate::domain::Decimal,
    pub updated_at_ms: i64,
}

impl From<Holding> for HoldingDto {
    fn from(holding: Holding) -> Self {
        HoldingDto {
            symbol: holding.key.symbol.as_str().to_string(),
            currency: holding.key.currency.as_str().to_string(),
            quantity: holding.quantity,
            average_cost: holding.average_cost,
            total_invested: holding.total_invested,
            updated_at_ms: holding.updated_at.as_ms(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingsResponse {
    pub holdings: Vec<HoldingDto>,
}

pub async fn list_holdings(
    Query(params): Query<HoldingsQuery>,
    State(state): State<AppState>,
) -> Result<Json<HoldingsResponse>, AppError> {
    let user = UserId::from_str(&params.user)
        .map_err(|_| AppError::BadRequest("Invalid user".into()))?;

    let holdings = state
        .store
        .list_for_user(&user)
        .await
        .map_err(|e| AppError::Internal(format!("Holdings query failed: {}", e)))?;

    Ok(Json(HoldingsResponse {
        holdings: holdings.into_iter().map(HoldingDto::from).collect(),
    }))
}
