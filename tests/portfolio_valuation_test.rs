use ledgercore::db::init_db;
use ledgercore::domain::{Currency, Decimal, HoldingKey, Symbol, UserId};
use ledgercore::feeds::mock::{MockFxFeed, MockPriceFeed};
use ledgercore::{HoldingStore, PortfolioValuer, Repository};
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

async fn setup(
    price_feed: MockPriceFeed,
    fx_feed: MockFxFeed,
) -> (Arc<HoldingStore>, PortfolioValuer, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");

    let repo = Arc::new(Repository::new(pool));
    let store = Arc::new(HoldingStore::new(repo));
    let valuer = PortfolioValuer::new(
        store.clone(),
        Arc::new(price_feed),
        Arc::new(fx_feed),
        Currency::new("AUD"),
    );
    (store, valuer, temp_dir)
}

fn key(symbol: &str, currency: &str) -> HoldingKey {
    HoldingKey::new(
        UserId::new("u1"),
        Symbol::new(symbol),
        Currency::new(currency),
    )
}

#[tokio::test]
async fn test_empty_portfolio_is_all_zero() {
    let (_store, valuer, _temp) = setup(MockPriceFeed::new(), MockFxFeed::new()).await;

    let pl = valuer.compute_portfolio_pl(&UserId::new("u1")).await.unwrap();
    assert!(pl.holdings.is_empty());
    assert!(pl.total_value.is_zero());
    assert!(pl.net_pl.is_zero());
    assert_eq!(pl.active_assets, 0);
    assert!(!pl.degraded);
}

#[tokio::test]
async fn test_single_holding_pl() {
    let prices = MockPriceFeed::new().with_price("BTC", "AUD", d("120000"));
    let (store, valuer, _temp) = setup(prices, MockFxFeed::new()).await;
    store
        .apply_buy_fill(&key("BTC", "AUD"), d("0.5"), d("50000"))
        .await
        .unwrap();

    let pl = valuer.compute_portfolio_pl(&UserId::new("u1")).await.unwrap();
    assert_eq!(pl.holdings.len(), 1);
    assert_eq!(pl.total_value, d("60000"));
    assert_eq!(pl.total_invested, d("50000"));
    assert_eq!(pl.net_pl, d("10000"));
    assert_eq!(pl.net_pl_percent, d("20"));
    assert_eq!(pl.active_assets, 1);
    assert!(!pl.degraded);
}

#[tokio::test]
async fn test_foreign_settlement_currency_converts() {
    let prices = MockPriceFeed::new().with_price("BTC", "AUD", d("100000"));
    let fx = MockFxFeed::new().with_rate("USD", "AUD", d("1.5"));
    let (store, valuer, _temp) = setup(prices, fx).await;
    store
        .apply_buy_fill(&key("BTC", "USD"), d("1"), d("60000"))
        .await
        .unwrap();

    let pl = valuer.compute_portfolio_pl(&UserId::new("u1")).await.unwrap();
    let valuation = &pl.holdings[0];
    assert_eq!(valuation.fx_rate, d("1.5"));
    assert_eq!(valuation.invested_reference, d("90000"));
    assert_eq!(valuation.current_value, d("100000"));
    assert_eq!(pl.net_pl, d("10000"));
    assert!(!pl.degraded);
}

#[tokio::test]
async fn test_fx_outage_falls_back_to_parity() {
    let prices = MockPriceFeed::new().with_price("BTC", "AUD", d("100000"));
    let fx = MockFxFeed::new().with_outage();
    let (store, valuer, _temp) = setup(prices, fx).await;
    store
        .apply_buy_fill(&key("BTC", "USD"), d("1"), d("60000"))
        .await
        .unwrap();

    let pl = valuer.compute_portfolio_pl(&UserId::new("u1")).await.unwrap();
    let valuation = &pl.holdings[0];
    assert_eq!(valuation.fx_rate, d("1"));
    assert_eq!(valuation.invested_reference, d("60000"));
    assert!(pl.degraded);
}

#[tokio::test]
async fn test_price_outage_values_holding_at_zero() {
    let prices = MockPriceFeed::new().with_outage();
    let (store, valuer, _temp) = setup(prices, MockFxFeed::new()).await;
    store
        .apply_buy_fill(&key("BTC", "AUD"), d("1"), d("60000"))
        .await
        .unwrap();

    let pl = valuer.compute_portfolio_pl(&UserId::new("u1")).await.unwrap();
    let valuation = &pl.holdings[0];
    assert!(valuation.spot_price.is_zero());
    assert!(valuation.current_value.is_zero());
    // Invested cost still counts: P/L reads fully negative during an outage.
    assert_eq!(pl.net_pl, d("-60000"));
    assert!(pl.degraded);
}

#[tokio::test]
async fn test_partial_outage_degrades_but_keeps_healthy_prices() {
    let prices = MockPriceFeed::new().with_price("BTC", "AUD", d("100000"));
    let (store, valuer, _temp) = setup(prices, MockFxFeed::new()).await;
    store
        .apply_buy_fill(&key("BTC", "AUD"), d("1"), d("90000"))
        .await
        .unwrap();
    // No ETH quote configured, so this lookup fails.
    store
        .apply_buy_fill(&key("ETH", "AUD"), d("10"), d("40000"))
        .await
        .unwrap();

    let pl = valuer.compute_portfolio_pl(&UserId::new("u1")).await.unwrap();
    assert_eq!(pl.total_value, d("100000"));
    assert_eq!(pl.total_invested, d("130000"));
    assert_eq!(pl.active_assets, 2);
    assert!(pl.degraded);
}

#[tokio::test]
async fn test_distinct_symbols_counted_once() {
    let prices = MockPriceFeed::new().with_price("BTC", "AUD", d("100000"));
    let fx = MockFxFeed::new().with_rate("USD", "AUD", d("1.5"));
    let (store, valuer, _temp) = setup(prices, fx).await;
    // Same asset in two settlement currencies: two holdings, one asset.
    store
        .apply_buy_fill(&key("BTC", "AUD"), d("1"), d("90000"))
        .await
        .unwrap();
    store
        .apply_buy_fill(&key("BTC", "USD"), d("1"), d("60000"))
        .await
        .unwrap();

    let pl = valuer.compute_portfolio_pl(&UserId::new("u1")).await.unwrap();
    assert_eq!(pl.holdings.len(), 2);
    assert_eq!(pl.active_assets, 1);
}
