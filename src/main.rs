use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use oneedge_backend::config::AppConfig;
use oneedge_backend::db::Database;
use oneedge_backend::services::price_feed::PriceFeedService;
use oneedge_backend::services::registry::OrderRegistry;
use oneedge_backend::services::strategies::StrategyRegistry;
use oneedge_backend::services::submission::OneInchClient;
use oneedge_backend::services::watcher::{SchedulerConfig, WatcherScheduler};
use oneedge_backend::store::{OrderStore, PgOrderStore};
use oneedge_backend::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oneedge_backend=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;

    tracing::info!("Starting oneedge backend v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Chain id: {}, poll interval: {}ms", config.chain_id, config.poll_interval_ms);

    // Metrics recorder
    let metrics_handle = oneedge_backend::metrics::init_metrics();

    // Database + durable order store
    let db = Database::connect(&config.database_url).await?;
    tracing::info!("Database connected, schema ready");
    let store: Arc<dyn OrderStore> = Arc::new(PgOrderStore::new(db.pool.clone()));

    // Price view, warmed from the market_data cache
    let prices = Arc::new(PriceFeedService::with_store(store.clone()));
    let known_symbols: Vec<String> = config
        .token_symbol_map()
        .values()
        .map(|base| format!("agg:spot:{}USDT", base))
        .collect();
    prices
        .warm_from_store(&known_symbols, config.staleness_threshold_ms)
        .await;

    // Submission client signed by the operator key
    let submission = Arc::new(OneInchClient::new(config.clone(), store.clone())?);
    tracing::info!("Submission client ready, operator {}", submission.operator_address());

    // Strategy registry and watcher scheduler
    let strategies = Arc::new(StrategyRegistry::standard());
    let scheduler = WatcherScheduler::new(
        store.clone(),
        strategies.clone(),
        prices.clone(),
        submission,
        SchedulerConfig {
            poll_interval: config.poll_interval(),
            staleness_ms: config.staleness_threshold_ms,
            token_symbols: config.token_symbol_map(),
        },
    );

    // Restart watchers for every order still owed one
    let restarted = scheduler.restart().await?;
    tracing::info!("Resumed {} watchers from the order store", restarted);

    let registry = OrderRegistry::new(
        store,
        strategies,
        prices.clone(),
        scheduler.clone(),
        config.token_symbol_map(),
        config.staleness_threshold_ms,
        config.chain_id,
    );

    // Build application state
    let state = Arc::new(AppState {
        config: config.clone(),
        registry,
        scheduler: scheduler.clone(),
        prices,
        metrics: metrics_handle,
    });

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .route(
            "/metrics",
            get(oneedge_backend::api::handlers::internal::metrics_handler),
        )
        .nest("/api/v1", oneedge_backend::api::routes::create_router(state.clone()))
        .nest(
            "/internal",
            oneedge_backend::api::routes::internal_router(state.clone()),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(scheduler))
        .await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn shutdown_signal(scheduler: Arc<WatcherScheduler>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received, stopping watchers");
    scheduler.stop();
}
