use ledgercore::feeds::http::{HttpFxFeed, HttpPriceFeed};
use ledgercore::feeds::{FxFeed, PriceFeed};
use ledgercore::provider::http::HttpSettlementProvider;
use ledgercore::provider::SettlementProvider;
use ledgercore::{
    api, config::Config, db::init_db, Currency, HoldingStore, PortfolioValuer, Repository,
    SettlementProcessor, StatusSynchronizer,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    // Initialize database and dependencies
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let repo = Arc::new(Repository::new(pool));
    let store = Arc::new(HoldingStore::new(repo.clone()));
    let provider: Arc<dyn SettlementProvider> = Arc::new(HttpSettlementProvider::new(
        config.provider_api_url.clone(),
    ));
    let processor = Arc::new(SettlementProcessor::new(
        repo.clone(),
        store.clone(),
        provider.clone(),
    ));
    let synchronizer = Arc::new(StatusSynchronizer::new(
        repo.clone(),
        processor.clone(),
        provider.clone(),
    ));

    let feed_timeout = Duration::from_millis(config.feed_timeout_ms);
    let price_feed: Arc<dyn PriceFeed> =
        match HttpPriceFeed::new(config.price_api_url.clone(), feed_timeout) {
            Ok(feed) => Arc::new(feed),
            Err(e) => {
                eprintln!("Failed to build price feed client: {}", e);
                std::process::exit(1);
            }
        };
    let fx_feed: Arc<dyn FxFeed> = match HttpFxFeed::new(config.fx_api_url.clone(), feed_timeout) {
        Ok(feed) => Arc::new(feed),
        Err(e) => {
            eprintln!("Failed to build fx feed client: {}", e);
            std::process::exit(1);
        }
    };
    let valuer = Arc::new(PortfolioValuer::new(
        store.clone(),
        price_feed,
        fx_feed,
        Currency::new(config.reference_currency.clone()),
    ));

    // Create router
    let app = api::create_router(api::AppState {
        repo,
        store,
        processor,
        synchronizer,
        valuer,
        config,
    });

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
