pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod feeds;
pub mod ledger;
pub mod provider;
pub mod settlement;
pub mod sync;
pub mod valuation;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    Currency, Decimal, Direction, Holding, HoldingKey, OrderId, OrderStatus, Symbol, TimeMs,
    TransactionRecord, UserId,
};
pub use error::AppError;
pub use ledger::HoldingStore;
pub use settlement::{SettlementOutcome, SettlementProcessor};
pub use sync::{OrderUpdate, StatusSynchronizer, SyncOutcome};
pub use valuation::PortfolioValuer;
