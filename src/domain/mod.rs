//! Domain types for the holdings ledger and settlement engine.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper
//! - Domain primitives: TimeMs, UserId, Symbol, Currency, OrderId, Direction
//! - The Holding aggregate keyed by user x symbol x settlement currency
//! - The TransactionRecord mirror of the external provider order and its
//!   closed status state machine

pub mod decimal;
pub mod holding;
pub mod primitives;
pub mod transaction;

pub use decimal::Decimal;
pub use holding::{Holding, HoldingKey};
pub use primitives::{Currency, Direction, OrderId, Symbol, TimeMs, UserId};
pub use transaction::{OrderStatus, TransactionRecord};
