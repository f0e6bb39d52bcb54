//! Shared harness for engine scenario tests: in-memory store, hand-fed
//! price feed, recording submission client, and a scheduler polling on a
//! compressed interval.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ethers::signers::{LocalWallet, Signer};
use ethers::utils::hash_message;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use oneedge_backend::auth::canonical_payload;
use oneedge_backend::models::{CreateOrderRequest, OrderParams, TickerSnapshot};
use oneedge_backend::services::price_feed::PriceFeedService;
use oneedge_backend::services::registry::OrderRegistry;
use oneedge_backend::services::strategies::StrategyRegistry;
use oneedge_backend::services::submission::MockSubmissionClient;
use oneedge_backend::services::watcher::{SchedulerConfig, WatcherScheduler};
use oneedge_backend::store::{MemoryOrderStore, OrderStore};

pub const MAKER_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const WETH: &str = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2";
pub const USDT: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";
pub const SYMBOL: &str = "agg:spot:ETHUSDT";

pub struct Harness {
    pub store: Arc<MemoryOrderStore>,
    pub prices: Arc<PriceFeedService>,
    pub submission: Arc<MockSubmissionClient>,
    pub scheduler: Arc<WatcherScheduler>,
    pub registry: OrderRegistry,
}

pub fn token_symbols() -> HashMap<String, String> {
    let mut map = HashMap::new();
    map.insert(WETH.to_string(), "ETH".to_string());
    map.insert(USDT.to_string(), "USDT".to_string());
    map
}

pub fn scheduler_for(
    store: Arc<MemoryOrderStore>,
    prices: Arc<PriceFeedService>,
    submission: Arc<MockSubmissionClient>,
    poll: Duration,
) -> Arc<WatcherScheduler> {
    WatcherScheduler::new(
        store,
        Arc::new(StrategyRegistry::standard()),
        prices,
        submission,
        SchedulerConfig {
            poll_interval: poll,
            staleness_ms: 60_000,
            token_symbols: token_symbols(),
        },
    )
}

pub fn harness_with_poll(poll: Duration) -> Harness {
    let store: Arc<MemoryOrderStore> = Arc::new(MemoryOrderStore::new());
    let prices = Arc::new(PriceFeedService::new());
    let submission = Arc::new(MockSubmissionClient::new());
    let scheduler = scheduler_for(store.clone(), prices.clone(), submission.clone(), poll);

    let registry = OrderRegistry::new(
        store.clone(),
        Arc::new(StrategyRegistry::standard()),
        prices.clone(),
        scheduler.clone(),
        token_symbols(),
        60_000,
        1,
    );

    Harness {
        store,
        prices,
        submission,
        scheduler,
        registry,
    }
}

pub fn harness() -> Harness {
    harness_with_poll(Duration::from_millis(20))
}

/// Build a create request signed by the well-known test maker
pub fn signed_request(params: OrderParams, size: Decimal) -> CreateOrderRequest {
    let wallet: LocalWallet = MAKER_KEY.parse().unwrap();
    let maker = format!("{:#x}", wallet.address());
    let order_type = params.order_type();
    let payload = canonical_payload(order_type, size, &params, &maker, WETH, USDT).unwrap();
    let signature = wallet.sign_hash(hash_message(&payload)).unwrap();

    CreateOrderRequest {
        order_type,
        maker,
        maker_asset: WETH.to_string(),
        taker_asset: USDT.to_string(),
        chain_id: None,
        size,
        params,
        signature: signature.to_string(),
    }
}

pub async fn push_mid(prices: &PriceFeedService, mid: Decimal) {
    prices
        .update_ticker(TickerSnapshot {
            symbol: SYMBOL.to_string(),
            mid,
            bid: mid - dec!(1),
            ask: mid + dec!(1),
            last: mid,
            timestamp: Utc::now().timestamp_millis(),
            analysis: None,
        })
        .await;
}

/// Poll `check` every 10ms until it returns true or `timeout` elapses
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait until the stored order satisfies `pred`
pub async fn wait_for_order<F>(
    store: &Arc<MemoryOrderStore>,
    id: uuid::Uuid,
    timeout: Duration,
    pred: F,
) -> oneedge_backend::models::Order
where
    F: Fn(&oneedge_backend::models::Order) -> bool,
{
    let ok = wait_until(timeout, || async {
        match store.get(id).await.unwrap() {
            Some(order) => pred(&order),
            None => false,
        }
    })
    .await;
    assert!(ok, "order {} never reached the expected state", id);
    store.get(id).await.unwrap().unwrap()
}
