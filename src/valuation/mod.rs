//! Valuation & P/L aggregation over the holdings ledger.
//!
//! Combines internal cost-basis data with the spot-price and FX feeds.
//! Feed outages degrade the numbers instead of failing the call: a missing
//! FX rate falls back to 1.0, a missing price values the holding at zero
//! (its invested cost still counts, biasing P/L negative during an outage).

use crate::domain::{Currency, Decimal, Holding, Symbol, UserId};
use crate::feeds::{FxFeed, PriceFeed};
use crate::ledger::{HoldingStore, LedgerError};
use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::warn;

/// One holding with its live valuation.
#[derive(Debug, Clone, Serialize)]
pub struct HoldingValuation {
    pub holding: Holding,
    /// Spot price in the reference currency; zero when the feed was down.
    pub spot_price: Decimal,
    /// Settlement-currency to reference-currency multiplier; 1.0 when the
    /// feed was down or no conversion was needed.
    pub fx_rate: Decimal,
    pub current_value: Decimal,
    pub invested_reference: Decimal,
    pub pl_abs: Decimal,
    pub pl_percent: Decimal,
}

/// Portfolio-level unrealized P/L in the reference currency.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioPl {
    pub reference_currency: Currency,
    pub holdings: Vec<HoldingValuation>,
    pub total_value: Decimal,
    pub total_invested: Decimal,
    pub net_pl: Decimal,
    pub net_pl_percent: Decimal,
    pub active_assets: usize,
    /// True when any feed lookup fell back to its degraded default.
    pub degraded: bool,
}

impl PortfolioPl {
    fn empty(reference_currency: Currency) -> Self {
        Self {
            reference_currency,
            holdings: Vec::new(),
            total_value: Decimal::zero(),
            total_invested: Decimal::zero(),
            net_pl: Decimal::zero(),
            net_pl_percent: Decimal::zero(),
            active_assets: 0,
            degraded: false,
        }
    }
}

pub struct PortfolioValuer {
    store: Arc<HoldingStore>,
    price_feed: Arc<dyn PriceFeed>,
    fx_feed: Arc<dyn FxFeed>,
    reference_currency: Currency,
}

impl PortfolioValuer {
    pub fn new(
        store: Arc<HoldingStore>,
        price_feed: Arc<dyn PriceFeed>,
        fx_feed: Arc<dyn FxFeed>,
        reference_currency: Currency,
    ) -> Self {
        Self {
            store,
            price_feed,
            fx_feed,
            reference_currency,
        }
    }

    /// Compute per-holding and portfolio-level unrealized P/L for a user.
    ///
    /// Each distinct symbol and each distinct non-reference settlement
    /// currency is fetched once, concurrently. Zero holdings yield an
    /// all-zero result; feed failures never surface as errors.
    ///
    /// # Errors
    /// Only database errors from listing the holdings.
    pub async fn compute_portfolio_pl(&self, user_id: &UserId) -> Result<PortfolioPl, LedgerError> {
        let holdings = self.store.list_for_user(user_id).await?;
        if holdings.is_empty() {
            return Ok(PortfolioPl::empty(self.reference_currency.clone()));
        }

        let symbols: BTreeSet<Symbol> =
            holdings.iter().map(|h| h.key.symbol.clone()).collect();
        let currencies: BTreeSet<Currency> = holdings
            .iter()
            .map(|h| h.key.currency.clone())
            .filter(|c| *c != self.reference_currency)
            .collect();

        let mut degraded = false;
        let (prices, fx_rates) = futures::join!(
            self.fetch_prices(&symbols),
            self.fetch_fx_rates(&currencies)
        );
        degraded |= prices.values().any(|p| p.is_none());
        degraded |= fx_rates.values().any(|r| r.is_none());

        let mut valuations = Vec::with_capacity(holdings.len());
        let mut total_value = Decimal::zero();
        let mut total_invested = Decimal::zero();

        for holding in holdings {
            let spot_price = prices
                .get(&holding.key.symbol)
                .copied()
                .flatten()
                .unwrap_or_else(Decimal::zero);
            let fx_rate = if holding.key.currency == self.reference_currency {
                Decimal::one()
            } else {
                fx_rates
                    .get(&holding.key.currency)
                    .copied()
                    .flatten()
                    .unwrap_or_else(Decimal::one)
            };

            let current_value = spot_price * holding.quantity;
            let invested_reference = holding.total_invested * fx_rate;
            let pl_abs = current_value - invested_reference;
            let pl_percent = if invested_reference.is_positive() {
                pl_abs / invested_reference * Decimal::hundred()
            } else {
                Decimal::zero()
            };

            total_value = total_value + current_value;
            total_invested = total_invested + invested_reference;
            valuations.push(HoldingValuation {
                holding,
                spot_price,
                fx_rate,
                current_value,
                invested_reference,
                pl_abs,
                pl_percent,
            });
        }

        let net_pl = total_value - total_invested;
        let net_pl_percent = if total_invested.is_positive() {
            net_pl / total_invested * Decimal::hundred()
        } else {
            Decimal::zero()
        };
        let active_assets = symbols.len();

        Ok(PortfolioPl {
            reference_currency: self.reference_currency.clone(),
            holdings: valuations,
            total_value,
            total_invested,
            net_pl,
            net_pl_percent,
            active_assets,
            degraded,
        })
    }

    /// One spot price per distinct symbol; a failed lookup maps to None.
    async fn fetch_prices(
        &self,
        symbols: &BTreeSet<Symbol>,
    ) -> HashMap<Symbol, Option<Decimal>> {
        let lookups = symbols.iter().map(|symbol| async move {
            let price = match self
                .price_feed
                .unit_price(symbol, &self.reference_currency)
                .await
            {
                Ok(price) => Some(price),
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "price feed failed, valuing at zero");
                    None
                }
            };
            (symbol.clone(), price)
        });
        join_all(lookups).await.into_iter().collect()
    }

    /// One FX rate per distinct non-reference currency; a failed lookup
    /// maps to None.
    async fn fetch_fx_rates(
        &self,
        currencies: &BTreeSet<Currency>,
    ) -> HashMap<Currency, Option<Decimal>> {
        let lookups = currencies.iter().map(|currency| async move {
            let rate = match self.fx_feed.rate(currency, &self.reference_currency).await {
                Ok(rate) => Some(rate),
                Err(e) => {
                    warn!(currency = %currency, error = %e, "fx feed failed, using rate 1.0");
                    None
                }
            };
            (currency.clone(), rate)
        });
        join_all(lookups).await.into_iter().collect()
    }
}
