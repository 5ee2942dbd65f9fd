//! TransactionRecord: our mirror of an external provider order, plus the
//! closed internal status vocabulary and its transition rules.

use crate::domain::{Currency, Decimal, Direction, OrderId, Symbol, TimeMs, UserId};
use serde::{Deserialize, Serialize};

/// Internal order status. Closed enum; every provider status normalizes
/// into exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Expired,
}

impl OrderStatus {
    /// Normalize the provider's status vocabulary.
    ///
    /// Recognized terminal and processing statuses map one-to-one; any
    /// unrecognized or intermediate status (e.g. "awaiting payment") is
    /// treated as still pending.
    pub fn normalize(provider_status: &str) -> Self {
        match provider_status.to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "processing" | "in_progress" => OrderStatus::Processing,
            "completed" | "complete" => OrderStatus::Completed,
            "failed" | "declined" | "refunded" => OrderStatus::Failed,
            "cancelled" | "canceled" => OrderStatus::Cancelled,
            "expired" => OrderStatus::Expired,
            _ => OrderStatus::Pending,
        }
    }

    /// Terminal statuses never advance again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Completed
                | OrderStatus::Failed
                | OrderStatus::Cancelled
                | OrderStatus::Expired
        )
    }

    /// Whether a stored status may move to `next`.
    ///
    /// Same-status updates are allowed (field enrichment still applies).
    /// Any change out of a terminal state is refused, as is falling back
    /// from Processing to Pending; both indicate a stale or out-of-order
    /// event.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        if self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        !(self == OrderStatus::Processing && next == OrderStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Failed => "FAILED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Expired => "EXPIRED",
        }
    }

    /// Parse a stored status string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(OrderStatus::Pending),
            "PROCESSING" => Some(OrderStatus::Processing),
            "COMPLETED" => Some(OrderStatus::Completed),
            "FAILED" => Some(OrderStatus::Failed),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            "EXPIRED" => Some(OrderStatus::Expired),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mirror of an external provider order.
///
/// Created when a user or the provider first reports order creation,
/// enriched by webhook and poll updates, never deleted (audit trail).
/// `settled_at` is the durable marker that this order's completion has
/// been applied to the holdings ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub direction: Direction,
    pub crypto_currency: Symbol,
    /// Asset quantity; unknown until the provider reports the fill.
    pub crypto_amount: Option<Decimal>,
    pub fiat_amount: Option<Decimal>,
    pub fiat_currency: Option<Currency>,
    pub network: Option<String>,
    pub wallet_address: Option<String>,
    pub wallet_link: Option<String>,
    pub status: OrderStatus,
    pub status_reason: Option<String>,
    /// Provider-specific payload kept verbatim for audit.
    pub provider_metadata: Option<serde_json::Value>,
    pub settled_at: Option<TimeMs>,
    pub created_at: TimeMs,
    pub updated_at: TimeMs,
}

impl TransactionRecord {
    /// A fresh Pending record for a newly reported order.
    pub fn new(
        order_id: OrderId,
        user_id: UserId,
        direction: Direction,
        crypto_currency: Symbol,
        created_at: TimeMs,
    ) -> Self {
        Self {
            order_id,
            user_id,
            direction,
            crypto_currency,
            crypto_amount: None,
            fiat_amount: None,
            fiat_currency: None,
            network: None,
            wallet_address: None,
            wallet_link: None,
            status: OrderStatus::Pending,
            status_reason: None,
            provider_metadata: None,
            settled_at: None,
            created_at,
            updated_at: created_at,
        }
    }
}
