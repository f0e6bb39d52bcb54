//! Watcher Scheduler
//!
//! One cooperative evaluation loop per active order. Each tick reads the
//! order's latest snapshot from the store, consults the price view, asks
//! the strategy whether to trigger, and on success advances trigger
//! accounting before persisting. Watchers deregister themselves on any
//! terminal status; restart re-spawns loops from the store so no
//! in-memory state is lost across a crash.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashSet;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{Order, OrderEvent, OrderStatus};
use crate::services::price_feed::PriceFeedService;
use crate::services::strategies::{EvalContext, StrategyRegistry};
use crate::services::submission::SubmissionClient;
use crate::store::OrderStore;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    pub staleness_ms: i64,
    /// Lowercased token address → ticker symbol
    pub token_symbols: HashMap<String, String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            staleness_ms: 60_000,
            token_symbols: HashMap::new(),
        }
    }
}

pub struct WatcherScheduler {
    store: Arc<dyn OrderStore>,
    strategies: Arc<StrategyRegistry>,
    prices: Arc<PriceFeedService>,
    submission: Arc<dyn SubmissionClient>,
    watchers: DashSet<Uuid>,
    running: AtomicBool,
    config: SchedulerConfig,
}

impl WatcherScheduler {
    pub fn new(
        store: Arc<dyn OrderStore>,
        strategies: Arc<StrategyRegistry>,
        prices: Arc<PriceFeedService>,
        submission: Arc<dyn SubmissionClient>,
        config: SchedulerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            strategies,
            prices,
            submission,
            watchers: DashSet::new(),
            running: AtomicBool::new(true),
            config,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn watcher_count(&self) -> usize {
        self.watchers.len()
    }

    pub fn is_watching(&self, id: Uuid) -> bool {
        self.watchers.contains(&id)
    }

    /// Spawn the evaluation loop for an order. Idempotent: a second call
    /// for the same id is a no-op.
    pub fn start_watcher(self: &Arc<Self>, id: Uuid) {
        if !self.is_running() {
            tracing::warn!(order_id = %id, "scheduler stopped; not starting watcher");
            return;
        }
        if !self.watchers.insert(id) {
            tracing::debug!(order_id = %id, "watcher already registered");
            return;
        }

        crate::metrics::set_watchers_active(self.watchers.len());
        tracing::info!(order_id = %id, "watcher started");

        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            scheduler.run_watcher(id).await;
        });
    }

    /// Restart watchers for every order the engine is still responsible
    /// for. Called once on service start; makes restarts transparent.
    pub async fn restart(self: &Arc<Self>) -> Result<usize, EngineError> {
        let mut seen = std::collections::HashSet::new();
        let mut orders = self.store.get_pending().await?;
        orders.extend(self.store.get_active().await?);

        let mut spawned = 0usize;
        for order in orders {
            if seen.insert(order.id) {
                self.start_watcher(order.id);
                spawned += 1;
            }
        }

        tracing::info!("restarted {} watchers from store", spawned);
        Ok(spawned)
    }

    /// Mark an order cancelled and deregister its watcher. Takes effect
    /// within one poll interval even if the deregister races the loop.
    pub async fn cancel_order(&self, id: Uuid) -> Result<Order, EngineError> {
        let mut order = self
            .store
            .get(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;

        if order.status.is_terminal() {
            // idempotent: repeated cancels after the first success are no-ops
            return Ok(order);
        }

        order.status = OrderStatus::Cancelled;
        order.cancelled_at = Some(Utc::now());
        self.store.save(&order).await?;
        self.store
            .append_event(&OrderEvent::transition(&order, OrderStatus::Cancelled))
            .await?;

        self.deregister(id);
        crate::metrics::record_order_cancelled();
        tracing::info!(order_id = %id, "order cancelled");
        Ok(order)
    }

    /// Stop every watcher. In-flight submits finish and persist; each
    /// loop observes the flag within one poll interval.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.watchers.clear();
        crate::metrics::set_watchers_active(0);
        tracing::info!("watcher scheduler stopped");
    }

    fn deregister(&self, id: Uuid) {
        self.watchers.remove(&id);
        crate::metrics::set_watchers_active(self.watchers.len());
    }

    fn eval_context(&self, order: &Order) -> EvalContext {
        let symbols = &self.config.token_symbols;
        let ticker = order
            .symbol(|addr| symbols.get(&addr.to_lowercase()).cloned())
            .and_then(|symbol| self.prices.get_price(&symbol));
        EvalContext::new(
            Utc::now().timestamp_millis(),
            ticker,
            self.config.staleness_ms,
        )
    }

    async fn run_watcher(self: Arc<Self>, id: Uuid) {
        loop {
            if !self.is_running() || !self.watchers.contains(&id) {
                break;
            }

            let snapshot = match self.store.get(id).await {
                Ok(Some(order)) => order,
                Ok(None) => {
                    tracing::warn!(order_id = %id, "order vanished; stopping watcher");
                    break;
                }
                Err(e) => {
                    // transient store failure: retry next tick, never drop a trigger
                    tracing::warn!(order_id = %id, "store read failed, retrying: {}", e);
                    tokio::time::sleep(self.config.poll_interval).await;
                    continue;
                }
            };

            if snapshot.status.is_terminal() {
                tracing::debug!(order_id = %id, status = %snapshot.status, "terminal status observed");
                break;
            }

            let strategy = match self.strategies.get(snapshot.order_type) {
                Ok(strategy) => strategy,
                Err(e) => {
                    // missing mapping is a programming error; fail the order
                    tracing::error!(order_id = %id, "{}", e);
                    self.mark_failed(snapshot, &e.to_string()).await;
                    break;
                }
            };

            let ctx = self.eval_context(&snapshot);

            if strategy.is_expired(&snapshot, ctx.now_ms) {
                let mut order = snapshot;
                order.status = OrderStatus::Expired;
                if let Err(e) = self.persist_transition(&order, OrderStatus::Expired).await {
                    tracing::warn!(order_id = %id, "expiry persist failed, retrying: {}", e);
                    tokio::time::sleep(self.config.poll_interval).await;
                    continue;
                }
                tracing::info!(order_id = %id, "order expired");
                break;
            }

            if strategy.should_trigger(&snapshot, &ctx) {
                let mut order = snapshot;
                match strategy.submit(&order, &ctx, self.submission.as_ref()).await {
                    Ok(outcome) => {
                        order.trigger_count += outcome.hash_count();
                        order.one_inch_order_hashes.push(outcome.order_hash.clone());
                        order
                            .one_inch_order_hashes
                            .extend(outcome.extra_hashes.iter().cloned());
                        order.remaining_size =
                            (order.remaining_size - outcome.consumed).max(Decimal::ZERO);
                        order.status = OrderStatus::Active;
                        if order.executed_at.is_none() {
                            order.executed_at = Some(Utc::now());
                        }
                        strategy.update_next_trigger(&mut order, &ctx);

                        // hash accounting must hit the store before anything
                        // that depends on it
                        if let Err(e) = self.store.save(&order).await {
                            tracing::error!(order_id = %id, "save after submit failed: {}", e);
                            self.mark_failed(order, &e.to_string()).await;
                            break;
                        }
                        for hash in std::iter::once(&outcome.order_hash)
                            .chain(outcome.extra_hashes.iter())
                        {
                            if let Err(e) = self
                                .store
                                .append_event(&OrderEvent::submitted(&order, hash, outcome.amount))
                                .await
                            {
                                tracing::warn!(order_id = %id, "submit event append failed: {}", e);
                            }
                        }

                        crate::metrics::record_triggers_fired(outcome.hash_count() as u64);
                        tracing::info!(
                            order_id = %id,
                            trigger_count = order.trigger_count,
                            remaining = %order.remaining_size,
                            "trigger fired"
                        );

                        // strategy completion wins over the exhaustion
                        // fallback so step/interval plans end COMPLETED
                        if strategy.should_complete(&order, &ctx) {
                            order.status = OrderStatus::Completed;
                            if let Err(e) =
                                self.persist_transition(&order, OrderStatus::Completed).await
                            {
                                tracing::warn!(order_id = %id, "completion persist failed: {}", e);
                            }
                            crate::metrics::record_order_completed();
                            tracing::info!(order_id = %id, "order completed");
                            break;
                        }

                        if order.remaining_size.is_zero() {
                            order.status = OrderStatus::Filled;
                            if let Err(e) =
                                self.persist_transition(&order, OrderStatus::Filled).await
                            {
                                tracing::warn!(order_id = %id, "fill persist failed: {}", e);
                            }
                            crate::metrics::record_order_filled();
                            break;
                        }
                    }
                    Err(e) => {
                        // submission failures are terminal for the order
                        tracing::error!(order_id = %id, "submit failed: {}", e);
                        crate::metrics::record_submission_failure();
                        self.mark_failed(order, &e.to_string()).await;
                        break;
                    }
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }

        self.deregister(id);
        tracing::debug!(order_id = %id, "watcher exited");
    }

    async fn persist_transition(
        &self,
        order: &Order,
        status: OrderStatus,
    ) -> Result<(), EngineError> {
        self.store.save(order).await?;
        self.store
            .append_event(&OrderEvent::transition(order, status))
            .await?;
        Ok(())
    }

    async fn mark_failed(&self, mut order: Order, reason: &str) {
        order.status = OrderStatus::Failed;
        if let Err(e) = self.store.save(&order).await {
            tracing::error!(order_id = %order.id, "failed-status save failed: {}", e);
        }
        if let Err(e) = self
            .store
            .append_event(&OrderEvent::failed(&order, reason))
            .await
        {
            tracing::error!(order_id = %order.id, "failure event append failed: {}", e);
        }
        crate::metrics::record_order_failed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        OrderParams, OrderType, StopLimitParams, TickerSnapshot, TwapParams,
    };
    use crate::services::submission::MockSubmissionClient;
    use crate::store::MemoryOrderStore;
    use rust_decimal_macros::dec;

    fn test_scheduler(
        store: Arc<MemoryOrderStore>,
        prices: Arc<PriceFeedService>,
        submission: Arc<MockSubmissionClient>,
    ) -> Arc<WatcherScheduler> {
        let mut token_symbols = HashMap::new();
        token_symbols.insert(
            "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2".to_string(),
            "ETH".to_string(),
        );
        token_symbols.insert(
            "0xdac17f958d2ee523a2206206994597c13d831ec7".to_string(),
            "USDT".to_string(),
        );
        WatcherScheduler::new(
            store,
            Arc::new(StrategyRegistry::standard()),
            prices,
            submission,
            SchedulerConfig {
                poll_interval: Duration::from_millis(20),
                staleness_ms: 60_000,
                token_symbols,
            },
        )
    }

    fn stop_limit_order() -> Order {
        crate::services::strategies::testutil::order_with(
            OrderParams::StopLimit(StopLimitParams {
                stop_price: dec!(4000),
                limit_price: dec!(4100),
                expiry_days: dec!(7),
            }),
            dec!(1.0),
        )
    }

    async fn push_mid(prices: &PriceFeedService, mid: Decimal) {
        prices
            .update_ticker(TickerSnapshot {
                symbol: "agg:spot:ETHUSDT".to_string(),
                mid,
                bid: mid - dec!(1),
                ask: mid + dec!(1),
                last: mid,
                timestamp: Utc::now().timestamp_millis(),
                analysis: None,
            })
            .await;
    }

    #[tokio::test]
    async fn test_start_watcher_idempotent() {
        let store = Arc::new(MemoryOrderStore::new());
        let prices = Arc::new(PriceFeedService::new());
        let submission = Arc::new(MockSubmissionClient::new());
        let scheduler = test_scheduler(store.clone(), prices, submission);

        let order = stop_limit_order();
        store.save(&order).await.unwrap();

        scheduler.start_watcher(order.id);
        scheduler.start_watcher(order.id);
        assert_eq!(scheduler.watcher_count(), 1);

        scheduler.stop();
    }

    #[tokio::test]
    async fn test_stop_limit_fires_once() {
        let store = Arc::new(MemoryOrderStore::new());
        let prices = Arc::new(PriceFeedService::new());
        let submission = Arc::new(MockSubmissionClient::new());
        let scheduler = test_scheduler(store.clone(), prices.clone(), submission.clone());

        let order = stop_limit_order();
        store.save(&order).await.unwrap();

        push_mid(&prices, dec!(3800)).await;
        scheduler.start_watcher(order.id);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(submission.submissions().is_empty());

        push_mid(&prices, dec!(4050)).await;
        tokio::time::sleep(Duration::from_millis(120)).await;

        let stored = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.trigger_count, 1);
        assert_eq!(stored.one_inch_order_hashes.len(), 1);
        assert_eq!(stored.status, OrderStatus::Completed);
        assert!(!scheduler.is_watching(order.id));

        // no re-trigger on later price updates
        push_mid(&prices, dec!(4200)).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(submission.submissions().len(), 1);

        scheduler.stop();
    }

    #[tokio::test]
    async fn test_submission_failure_is_terminal() {
        let store = Arc::new(MemoryOrderStore::new());
        let prices = Arc::new(PriceFeedService::new());
        let submission = Arc::new(MockSubmissionClient::new());
        submission.fail_with("gas price too high");
        let scheduler = test_scheduler(store.clone(), prices.clone(), submission.clone());

        let order = stop_limit_order();
        store.save(&order).await.unwrap();
        push_mid(&prices, dec!(4050)).await;

        scheduler.start_watcher(order.id);
        tokio::time::sleep(Duration::from_millis(120)).await;

        let stored = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Failed);
        assert_eq!(stored.trigger_count, 0);

        let events = store.events(order.id).await.unwrap();
        assert!(events
            .iter()
            .any(|e| e.status == OrderStatus::Failed && e.error.is_some()));

        scheduler.stop();
    }

    #[tokio::test]
    async fn test_cancel_observed_and_idempotent() {
        let store = Arc::new(MemoryOrderStore::new());
        let prices = Arc::new(PriceFeedService::new());
        let submission = Arc::new(MockSubmissionClient::new());
        let scheduler = test_scheduler(store.clone(), prices.clone(), submission);

        let order = stop_limit_order();
        store.save(&order).await.unwrap();
        push_mid(&prices, dec!(3800)).await;
        scheduler.start_watcher(order.id);

        let cancelled = scheduler.cancel_order(order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());
        assert!(!scheduler.is_watching(order.id));

        // second cancel is a no-op returning the same terminal state
        let again = scheduler.cancel_order(order.id).await.unwrap();
        assert_eq!(again.status, OrderStatus::Cancelled);
        assert_eq!(again.cancelled_at, cancelled.cancelled_at);

        scheduler.stop();
    }

    #[tokio::test]
    async fn test_restart_spawns_nonterminal_only() {
        let store = Arc::new(MemoryOrderStore::new());
        let prices = Arc::new(PriceFeedService::new());
        let submission = Arc::new(MockSubmissionClient::new());
        let scheduler = test_scheduler(store.clone(), prices, submission);

        let pending = stop_limit_order();
        let mut active = stop_limit_order();
        active.status = OrderStatus::Active;
        let mut done = stop_limit_order();
        done.status = OrderStatus::Completed;

        store.save(&pending).await.unwrap();
        store.save(&active).await.unwrap();
        store.save(&done).await.unwrap();

        let spawned = scheduler.restart().await.unwrap();
        assert_eq!(spawned, 2);
        assert!(scheduler.is_watching(pending.id));
        assert!(scheduler.is_watching(active.id));
        assert!(!scheduler.is_watching(done.id));

        scheduler.stop();
    }

    #[tokio::test]
    async fn test_twap_slices_to_completion() {
        let store = Arc::new(MemoryOrderStore::new());
        let prices = Arc::new(PriceFeedService::new());
        let submission = Arc::new(MockSubmissionClient::new());
        let scheduler = test_scheduler(store.clone(), prices.clone(), submission.clone());

        let now = Utc::now().timestamp_millis();
        let mut order = crate::services::strategies::testutil::order_with(
            OrderParams::Twap(TwapParams {
                amount: dec!(1.0),
                start_date: now,
                end_date: now + 200,
                interval: 50,
                max_price: None,
            }),
            dec!(1.0),
        );
        order.order_type = OrderType::Twap;
        order.next_trigger_value = Some(Decimal::from(now));
        store.save(&order).await.unwrap();
        push_mid(&prices, dec!(4000)).await;

        scheduler.start_watcher(order.id);
        for _ in 0..30 {
            push_mid(&prices, dec!(4000)).await;
            tokio::time::sleep(Duration::from_millis(25)).await;
            if let Some(stored) = store.get(order.id).await.unwrap() {
                if stored.status.is_terminal() {
                    break;
                }
            }
        }

        let stored = store.get(order.id).await.unwrap().unwrap();
        assert!(stored.status == OrderStatus::Completed || stored.status == OrderStatus::Filled);
        assert_eq!(
            stored.one_inch_order_hashes.len() as i32,
            stored.trigger_count
        );
        assert!(stored.trigger_count >= 1);

        scheduler.stop();
    }
}
