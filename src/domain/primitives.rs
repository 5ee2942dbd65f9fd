//! Domain primitives: TimeMs, UserId, Symbol, Currency, OrderId, Direction.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        TimeMs(chrono::Utc::now().timestamp_millis())
    }

    pub fn as_ms(&self) -> i64 {
        self.0
    }
}

/// Error for parsing a blank identifier string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0} must not be empty")]
pub struct EmptyIdError(pub &'static str);

macro_rules! string_newtype {
    ($(#[$doc:meta])* $name:ident, $label:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                $name(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = EmptyIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Err(EmptyIdError($label))
                } else {
                    Ok($name(trimmed.to_string()))
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_newtype!(
    /// Resolved user identity supplied by the session collaborator.
    UserId,
    "user id"
);

string_newtype!(
    /// Crypto asset symbol (e.g. "BTC", "ETH").
    Symbol,
    "symbol"
);

string_newtype!(
    /// ISO fiat currency code (e.g. "AUD", "USD").
    Currency,
    "currency"
);

string_newtype!(
    /// External settlement provider order id; also our primary key.
    OrderId,
    "order id"
);

/// Order direction: Buy or Sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
        }
    }

    /// Parse the stored/provider direction string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Some(Direction::Buy),
            "SELL" => Some(Direction::Sell),
            _ => None,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newtype_parse_rejects_blank() {
        assert!(UserId::from_str("  ").is_err());
        assert!(Symbol::from_str("").is_err());
        assert_eq!(Symbol::from_str(" BTC ").unwrap(), Symbol::new("BTC"));
    }

    #[test]
    fn test_direction_roundtrip() {
        assert_eq!(Direction::parse("BUY"), Some(Direction::Buy));
        assert_eq!(Direction::parse("sell"), Some(Direction::Sell));
        assert_eq!(Direction::parse("HODL"), None);
        assert_eq!(Direction::Sell.as_str(), "SELL");
    }

    #[test]
    fn test_direction_serialization() {
        assert_eq!(serde_json::to_string(&Direction::Buy).unwrap(), "\"BUY\"");
    }

    #[test]
    fn test_timems_ordering() {
        assert!(TimeMs::new(1000) < TimeMs::new(2000));
    }
}
