use ledgercore::db::init_db;
use ledgercore::domain::{
    Currency, Decimal, Direction, HoldingKey, OrderId, OrderStatus, Symbol, TimeMs,
    TransactionRecord, UserId,
};
use ledgercore::provider::MockSettlementProvider;
use ledgercore::sync::SyncError;
use ledgercore::{
    HoldingStore, OrderUpdate, Repository, SettlementOutcome, SettlementProcessor,
    StatusSynchronizer, SyncOutcome,
};
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;

struct TestHarness {
    repo: Arc<Repository>,
    store: Arc<HoldingStore>,
    synchronizer: Arc<StatusSynchronizer>,
    _temp: TempDir,
}

async fn setup() -> TestHarness {
    setup_with_provider(MockSettlementProvider::new()).await
}

async fn setup_with_provider(provider: MockSettlementProvider) -> TestHarness {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");

    let repo = Arc::new(Repository::new(pool));
    let store = Arc::new(HoldingStore::new(repo.clone()));
    let provider = Arc::new(provider);
    let processor = Arc::new(SettlementProcessor::new(
        repo.clone(),
        store.clone(),
        provider.clone(),
    ));
    let synchronizer = Arc::new(StatusSynchronizer::new(
        repo.clone(),
        processor,
        provider,
    ));

    TestHarness {
        repo,
        store,
        synchronizer,
        _temp: temp_dir,
    }
}

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn pending_buy(order_id: &str) -> TransactionRecord {
    TransactionRecord::new(
        OrderId::new(order_id),
        UserId::new("u1"),
        Direction::Buy,
        Symbol::new("BTC"),
        TimeMs::new(1000),
    )
}

fn update(order_id: &str, status: &str) -> OrderUpdate {
    OrderUpdate {
        id: order_id.to_string(),
        status: Some(status.to_string()),
        ..Default::default()
    }
}

fn completed_update(order_id: &str, qty: &str, cost: &str) -> OrderUpdate {
    OrderUpdate {
        id: order_id.to_string(),
        status: Some("completed".to_string()),
        crypto_amount: Some(d(qty)),
        fiat_amount: Some(d(cost)),
        fiat_currency: Some("AUD".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_unknown_order_is_acknowledged_and_dropped() {
    let harness = setup().await;
    let outcome = harness
        .synchronizer
        .apply_update(&update("missing", "completed"))
        .await
        .unwrap();
    assert!(matches!(outcome, SyncOutcome::UnknownOrder));
}

#[tokio::test]
async fn test_status_advances_through_lifecycle() {
    let harness = setup().await;
    harness
        .repo
        .insert_transaction(&pending_buy("ord-1"))
        .await
        .unwrap();

    harness
        .synchronizer
        .apply_update(&update("ord-1", "processing"))
        .await
        .unwrap();
    let stored = harness
        .repo
        .get_transaction(&OrderId::new("ord-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, OrderStatus::Processing);

    harness
        .synchronizer
        .apply_update(&update("ord-1", "failed"))
        .await
        .unwrap();
    let stored = harness
        .repo
        .get_transaction(&OrderId::new("ord-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, OrderStatus::Failed);
}

#[tokio::test]
async fn test_terminal_status_never_regresses() {
    let harness = setup().await;
    harness
        .repo
        .insert_transaction(&pending_buy("ord-1"))
        .await
        .unwrap();

    harness
        .synchronizer
        .apply_update(&completed_update("ord-1", "0.5", "50000"))
        .await
        .unwrap();

    // A stale, out-of-order event arrives after completion.
    harness
        .synchronizer
        .apply_update(&update("ord-1", "pending"))
        .await
        .unwrap();
    let stored = harness
        .repo
        .get_transaction(&OrderId::new("ord-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, OrderStatus::Completed);
}

#[tokio::test]
async fn test_processing_never_falls_back_to_pending() {
    let harness = setup().await;
    harness
        .repo
        .insert_transaction(&pending_buy("ord-1"))
        .await
        .unwrap();

    harness
        .synchronizer
        .apply_update(&update("ord-1", "processing"))
        .await
        .unwrap();
    harness
        .synchronizer
        .apply_update(&update("ord-1", "awaiting payment"))
        .await
        .unwrap();

    let stored = harness
        .repo
        .get_transaction(&OrderId::new("ord-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, OrderStatus::Processing);
}

#[tokio::test]
async fn test_refused_status_still_merges_fields() {
    let harness = setup().await;
    harness
        .repo
        .insert_transaction(&pending_buy("ord-1"))
        .await
        .unwrap();
    harness
        .synchronizer
        .apply_update(&completed_update("ord-1", "0.5", "50000"))
        .await
        .unwrap();

    // Stale status, but the wallet address is new information.
    let mut stale = update("ord-1", "processing");
    stale.wallet_address = Some("bc1qxyz".to_string());
    harness.synchronizer.apply_update(&stale).await.unwrap();

    let stored = harness
        .repo
        .get_transaction(&OrderId::new("ord-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, OrderStatus::Completed);
    assert_eq!(stored.wallet_address.as_deref(), Some("bc1qxyz"));
}

#[tokio::test]
async fn test_completion_settles_the_buy() {
    let harness = setup().await;
    harness
        .repo
        .insert_transaction(&pending_buy("ord-1"))
        .await
        .unwrap();

    let outcome = harness
        .synchronizer
        .apply_update(&completed_update("ord-1", "0.5", "50000"))
        .await
        .unwrap();
    match outcome {
        SyncOutcome::Applied { record, settlement } => {
            assert_eq!(record.status, OrderStatus::Completed);
            assert!(matches!(settlement, Some(SettlementOutcome::Settled(_))));
        }
        other => panic!("expected Applied, got {:?}", other),
    }

    let key = HoldingKey::new(UserId::new("u1"), Symbol::new("BTC"), Currency::new("AUD"));
    let holding = harness.store.get(&key).await.unwrap().unwrap();
    assert_eq!(holding.quantity, d("0.5"));
    assert_eq!(holding.total_invested, d("50000"));
}

#[tokio::test]
async fn test_duplicate_completion_event_is_a_no_op() {
    let harness = setup().await;
    harness
        .repo
        .insert_transaction(&pending_buy("ord-1"))
        .await
        .unwrap();

    let event = completed_update("ord-1", "0.5", "50000");
    harness.synchronizer.apply_update(&event).await.unwrap();
    let outcome = harness.synchronizer.apply_update(&event).await.unwrap();
    match outcome {
        SyncOutcome::Applied { settlement, .. } => {
            assert!(matches!(settlement, Some(SettlementOutcome::AlreadySettled)));
        }
        other => panic!("expected Applied, got {:?}", other),
    }

    let key = HoldingKey::new(UserId::new("u1"), Symbol::new("BTC"), Currency::new("AUD"));
    let holding = harness.store.get(&key).await.unwrap().unwrap();
    assert_eq!(holding.quantity, d("0.5"));
}

#[tokio::test]
async fn test_concurrent_terminal_and_stale_updates_keep_terminal_status() {
    // Webhook and poll are independent writers; whichever order the two
    // land in, the terminal status must survive and fields merged by
    // either writer must not be lost.
    for i in 0..20 {
        let harness = setup().await;
        let order_id = format!("ord-{}", i);
        harness
            .repo
            .insert_transaction(&pending_buy(&order_id))
            .await
            .unwrap();

        let terminal = {
            let mut u = update(&order_id, "failed");
            u.crypto_amount = Some(d("0.5"));
            u
        };
        let stale = update(&order_id, "awaiting payment");

        let sync_a = harness.synchronizer.clone();
        let sync_b = harness.synchronizer.clone();
        let a = tokio::spawn(async move { sync_a.apply_update(&terminal).await });
        let b = tokio::spawn(async move { sync_b.apply_update(&stale).await });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let stored = harness
            .repo
            .get_transaction(&OrderId::new(order_id.clone()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            stored.status,
            OrderStatus::Failed,
            "iteration {}: stale event overwrote a terminal status",
            i
        );
        assert_eq!(
            stored.crypto_amount,
            Some(d("0.5")),
            "iteration {}: stale event clobbered a merged field",
            i
        );
    }
}

#[tokio::test]
async fn test_refresh_order_pulls_from_provider() {
    let provider = MockSettlementProvider::new().with_order_update(OrderUpdate {
        id: "ord-1".to_string(),
        status: Some("processing".to_string()),
        ..Default::default()
    });
    let harness = setup_with_provider(provider).await;
    harness
        .repo
        .insert_transaction(&pending_buy("ord-1"))
        .await
        .unwrap();

    let outcome = harness
        .synchronizer
        .refresh_order(&OrderId::new("ord-1"), "token-abc")
        .await
        .unwrap();
    match outcome {
        SyncOutcome::Applied { record, .. } => {
            assert_eq!(record.status, OrderStatus::Processing);
        }
        other => panic!("expected Applied, got {:?}", other),
    }
}

#[tokio::test]
async fn test_refresh_propagates_provider_failure() {
    let harness = setup_with_provider(MockSettlementProvider::new().with_failing_fetch()).await;
    harness
        .repo
        .insert_transaction(&pending_buy("ord-1"))
        .await
        .unwrap();

    let result = harness
        .synchronizer
        .refresh_order(&OrderId::new("ord-1"), "token-abc")
        .await;
    assert!(matches!(result, Err(SyncError::Provider(_))));
}
