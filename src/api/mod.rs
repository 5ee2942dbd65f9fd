pub mod health;
pub mod holdings;
pub mod orders;
pub mod portfolio;
pub mod sell;
pub mod webhook;

use crate::config::Config;
use crate::db::Repository;
use crate::ledger::HoldingStore;
use crate::settlement::SettlementProcessor;
use crate::sync::StatusSynchronizer;
use crate::valuation::PortfolioValuer;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub store: Arc<HoldingStore>,
    pub processor: Arc<SettlementProcessor>,
    pub synchronizer: Arc<StatusSynchronizer>,
    pub valuer: Arc<PortfolioValuer>,
    pub config: Config,
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route(
            "/v1/orders",
            post(orders::register_order).get(orders::list_orders),
        )
        .route("/v1/orders/:id/refresh", post(orders::refresh_order))
        .route("/v1/webhooks/settlement", post(webhook::settlement_webhook))
        .route("/v1/sell", post(sell::request_sell))
        .route("/v1/holdings", get(holdings::list_holdings))
        .route("/v1/portfolio/pnl", get(portfolio::get_portfolio_pl))
        .layer(cors)
        .with_state(state)
}
