use ledgercore::db::init_db;
use ledgercore::domain::{Currency, Decimal, HoldingKey, Symbol, UserId};
use ledgercore::ledger::LedgerError;
use ledgercore::{HoldingStore, Repository};
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;

async fn setup_store() -> (Arc<HoldingStore>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    (Arc::new(HoldingStore::new(repo)), temp_dir)
}

fn key(user: &str, symbol: &str, currency: &str) -> HoldingKey {
    HoldingKey::new(
        UserId::new(user),
        Symbol::new(symbol),
        Currency::new(currency),
    )
}

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

#[tokio::test]
async fn test_first_buy_creates_position() {
    let (store, _temp) = setup_store().await;
    let k = key("u1", "BTC", "AUD");

    let holding = store.apply_buy_fill(&k, d("0.5"), d("50000")).await.unwrap();
    assert_eq!(holding.quantity, d("0.5"));
    assert_eq!(holding.average_cost, d("100000"));
    assert_eq!(holding.total_invested, d("50000"));
}

#[tokio::test]
async fn test_second_buy_reaverages() {
    let (store, _temp) = setup_store().await;
    let k = key("u1", "BTC", "AUD");

    store.apply_buy_fill(&k, d("0.5"), d("50000")).await.unwrap();
    let holding = store.apply_buy_fill(&k, d("0.5"), d("60000")).await.unwrap();

    assert_eq!(holding.quantity, d("1.0"));
    assert_eq!(holding.total_invested, d("110000"));
    assert_eq!(holding.average_cost, d("110000"));
}

#[tokio::test]
async fn test_partial_sell_is_proportional() {
    let (store, _temp) = setup_store().await;
    let k = key("u1", "BTC", "AUD");

    store.apply_buy_fill(&k, d("0.5"), d("50000")).await.unwrap();
    store.apply_buy_fill(&k, d("0.5"), d("60000")).await.unwrap();
    let holding = store.apply_sell_fill(&k, d("0.4")).await.unwrap();

    assert_eq!(holding.quantity, d("0.6"));
    // Invested shrinks by average_cost * sold quantity; average is untouched.
    assert_eq!(holding.total_invested, d("66000"));
    assert_eq!(holding.average_cost, d("110000"));
}

#[tokio::test]
async fn test_full_sell_deletes_position() {
    let (store, _temp) = setup_store().await;
    let k = key("u1", "BTC", "AUD");

    store.apply_buy_fill(&k, d("2"), d("1000")).await.unwrap();
    let holding = store.apply_sell_fill(&k, d("2")).await.unwrap();

    assert!(holding.quantity.is_zero());
    assert!(holding.total_invested.is_zero());
    assert!(store.get(&k).await.unwrap().is_none());
}

#[tokio::test]
async fn test_oversell_rejected_not_truncated() {
    let (store, _temp) = setup_store().await;
    let k = key("u1", "BTC", "AUD");

    store.apply_buy_fill(&k, d("1"), d("1000")).await.unwrap();
    let result = store.apply_sell_fill(&k, d("1.5")).await;

    match result {
        Err(LedgerError::InsufficientHolding { requested, held }) => {
            assert_eq!(requested, d("1.5"));
            assert_eq!(held, d("1"));
        }
        other => panic!("expected InsufficientHolding, got {:?}", other.map(|h| h.quantity)),
    }

    // Rejection leaves the position untouched.
    let holding = store.get(&k).await.unwrap().unwrap();
    assert_eq!(holding.quantity, d("1"));
    assert_eq!(holding.total_invested, d("1000"));
}

#[tokio::test]
async fn test_rebuy_after_full_sell_starts_fresh() {
    let (store, _temp) = setup_store().await;
    let k = key("u1", "BTC", "AUD");

    store.apply_buy_fill(&k, d("1"), d("100000")).await.unwrap();
    store.apply_sell_fill(&k, d("1")).await.unwrap();

    // The old cost basis must not leak into the new position.
    let holding = store.apply_buy_fill(&k, d("1"), d("40000")).await.unwrap();
    assert_eq!(holding.average_cost, d("40000"));
    assert_eq!(holding.total_invested, d("40000"));
}

#[tokio::test]
async fn test_keys_are_isolated() {
    let (store, _temp) = setup_store().await;
    let btc_aud = key("u1", "BTC", "AUD");
    let btc_usd = key("u1", "BTC", "USD");
    let eth_aud = key("u1", "ETH", "AUD");
    let other_user = key("u2", "BTC", "AUD");

    store.apply_buy_fill(&btc_aud, d("1"), d("100")).await.unwrap();
    store.apply_buy_fill(&btc_usd, d("2"), d("200")).await.unwrap();
    store.apply_buy_fill(&eth_aud, d("3"), d("300")).await.unwrap();
    store.apply_buy_fill(&other_user, d("4"), d("400")).await.unwrap();

    store.apply_sell_fill(&btc_aud, d("1")).await.unwrap();

    assert!(store.get(&btc_aud).await.unwrap().is_none());
    assert_eq!(store.get(&btc_usd).await.unwrap().unwrap().quantity, d("2"));
    assert_eq!(store.get(&eth_aud).await.unwrap().unwrap().quantity, d("3"));
    assert_eq!(store.get(&other_user).await.unwrap().unwrap().quantity, d("4"));

    let u1_holdings = store.list_for_user(&UserId::new("u1")).await.unwrap();
    assert_eq!(u1_holdings.len(), 2);
}

#[tokio::test]
async fn test_concurrent_buys_on_one_key_all_land() {
    let (store, _temp) = setup_store().await;
    let k = key("u1", "BTC", "AUD");

    let mut handles = Vec::new();
    for _ in 0..10 {
        let store = store.clone();
        let k = k.clone();
        handles.push(tokio::spawn(async move {
            store.apply_buy_fill(&k, d("1"), d("100")).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let holding = store.get(&k).await.unwrap().unwrap();
    assert_eq!(holding.quantity, d("10"));
    assert_eq!(holding.total_invested, d("1000"));
    assert_eq!(holding.average_cost, d("100"));
}
