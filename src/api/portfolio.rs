use crate::api::AppState;
use crate::domain::{Decimal, UserId};
use crate::error::AppError;
use crate::valuation::PortfolioPl;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Deserialize)]
pub struct PortfolioQuery {
    pub user: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingPlDto {
    pub symbol: String,
    pub currency: String,
    pub quantity: Decimal,
    pub spot_price: Decimal,
    pub fx_rate: Decimal,
    pub current_value: Decimal,
    pub invested: Decimal,
    pub pl_abs: Decimal,
    pub pl_percent: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioPlResponse {
    pub reference_currency: String,
    pub holdings: Vec<HoldingPlDto>,
    pub total_value: Decimal,
    pub total_invested: Decimal,
    pub net_pl: Decimal,
    pub net_pl_percent: Decimal,
    pub active_assets: usize,
    pub degraded: bool,
}

impl From<PortfolioPl> for PortfolioPlResponse {
    fn from(pl: PortfolioPl) -> Self {
        PortfolioPlResponse {
            reference_currency: pl.reference_currency.as_str().to_string(),
            holdings: pl
                .holdings
                .into_iter()
                .map(|v| HoldingPlDto {
                    symbol: v.holding.key.symbol.as_str().to_string(),
                    currency: v.holding.key.currency.as_str().to_string(),
                    quantity: v.holding.quantity,
                    spot_price: v.spot_price,
                    fx_rate: v.fx_rate,
                    current_value: v.current_value,
                    invested: v.invested_reference,
                    pl_abs: v.pl_abs,
                    pl_percent: v.pl_percent,
                })
                .collect(),
            total_value: pl.total_value,
            total_invested: pl.total_invested,
            net_pl: pl.net_pl,
            net_pl_percent: pl.net_pl_percent,
            active_assets: pl.active_assets,
            degraded: pl.degraded,
        }
    }
}

pub async fn get_portfolio_pl(
    Query(params): Query<PortfolioQuery>,
    State(state): State<AppState>,
) -> Result<Json<PortfolioPlResponse>, AppError> {
    let user = UserId::from_str(&params.user)
        .map_err(|_| AppError::BadRequest("Invalid user".into()))?;

    let pl = state
        .valuer
        .compute_portfolio_pl(&user)
        .await
        .map_err(|e| AppError::Internal(format!("Valuation failed: {}", e)))?;

    Ok(Json(pl.into()))
}
