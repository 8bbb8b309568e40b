//! Subscription poll engine.
//!
//! Each tick loads every subscription and refreshes them one at a time. A
//! subscription's first poll only fills its cache; later polls diff the
//! interleaved results against the cache, persist the merged cache and then
//! notify. Fetch, diff, persist and notify never overlap for one subscription.

use crate::aggregator::SourceAggregator;
use crate::config::EngineConfig;
use crate::notify::send_update;
use crate::types::{Notifier, PollOutcome, Result, Subscription, SubscriptionStore, TickSummary};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Per-source fetch cap for each refresh
    pub subscription_max: usize,
    /// Per-source cache cap multiplier
    pub cache_max: usize,
    /// Delay after every subscription and after every tick
    pub latency: Duration,
    pub max_reply_lines: usize,
}

impl From<&EngineConfig> for PollerConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            subscription_max: config.subscription_max,
            cache_max: config.cache_max,
            latency: config.poller_latency(),
            max_reply_lines: config.max_reply_lines,
        }
    }
}

pub struct SubscriptionPoller {
    aggregator: Arc<SourceAggregator>,
    store: Arc<dyn SubscriptionStore>,
    notifier: Arc<dyn Notifier>,
    config: PollerConfig,
}

impl SubscriptionPoller {
    pub fn new(
        aggregator: Arc<SourceAggregator>,
        store: Arc<dyn SubscriptionStore>,
        notifier: Arc<dyn Notifier>,
        config: PollerConfig,
    ) -> Self {
        Self {
            aggregator,
            store,
            notifier,
            config,
        }
    }

    /// Maximum number of identifiers kept per subscription. Never smaller
    /// than one full fetch, or unseen surplus would be reported every tick.
    pub fn cache_capacity(&self) -> usize {
        self.config.cache_max.max(self.config.subscription_max) * self.aggregator.source_count()
    }

    pub async fn poll_subscription(&self, subscription: &Subscription) -> Result<PollOutcome> {
        let results = self
            .aggregator
            .query_interleaved(&subscription.query, self.config.subscription_max)
            .await;

        if !subscription.cache_initialized {
            let cache = merge_cache(&results, &[], self.cache_capacity());
            let cached = cache.len();
            self.store.merge_update(&subscription.cache_update(cache)).await?;
            info!("Primed [{}] for {} with {} items", subscription.query, subscription.scope_key, cached);
            return Ok(PollOutcome::Primed { cached });
        }

        let new_items = new_items(&results, &subscription.seen_cache);
        if new_items.is_empty() {
            debug!("No new items for [{}] in {}", subscription.query, subscription.scope_key);
            return Ok(PollOutcome::Unchanged);
        }

        let cache = merge_cache(&results, &subscription.seen_cache, self.cache_capacity());
        self.store.merge_update(&subscription.cache_update(cache)).await?;
        send_update(
            self.notifier.as_ref(),
            subscription,
            &new_items,
            self.config.max_reply_lines,
        )
        .await?;

        Ok(PollOutcome::Updated { new_items })
    }

    /// One pass over every subscription. Failures of a single subscription
    /// are logged and counted; only a failed scan aborts the tick.
    pub async fn tick(&self) -> Result<TickSummary> {
        let subscriptions = self.store.scan_all().await?;
        let mut summary = TickSummary::default();
        debug!("Poll tick over {} subscriptions", subscriptions.len());

        for subscription in &subscriptions {
            match self.poll_subscription(subscription).await {
                Ok(PollOutcome::Primed { .. }) => summary.primed += 1,
                Ok(PollOutcome::Updated { .. }) => summary.updated += 1,
                Ok(PollOutcome::Unchanged) => {}
                Err(e) => {
                    warn!(
                        "Polling [{}] for {} failed: {}",
                        subscription.query, subscription.scope_key, e
                    );
                    summary.failed += 1;
                }
            }
            summary.processed += 1;
            tokio::time::sleep(self.config.latency).await;
        }

        Ok(summary)
    }

    /// Poll forever. Never returns.
    pub async fn run(&self) {
        info!(
            "Subscription poller started ({} sources, latency {:?})",
            self.aggregator.source_count(),
            self.config.latency
        );

        loop {
            match self.tick().await {
                Ok(summary) if summary.processed > 0 => info!(
                    "Poll tick: {} processed, {} primed, {} updated, {} failed",
                    summary.processed, summary.primed, summary.updated, summary.failed
                ),
                Ok(_) => {}
                Err(e) => error!("Poll tick failed: {}", e),
            }
            tokio::time::sleep(self.config.latency).await;
        }
    }

    /// Start `run` as a background task. Each call starts another loop.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }
}

/// Items of `results` not in `seen`, in result order, without repeats.
pub fn new_items(results: &[String], seen: &[String]) -> Vec<String> {
    let mut skip: HashSet<&str> = seen.iter().map(String::as_str).collect();
    results
        .iter()
        .filter(|item| skip.insert(item.as_str()))
        .cloned()
        .collect()
}

/// Fresh results first, then the older cache, each identifier once, capped.
pub fn merge_cache(results: &[String], seen: &[String], capacity: usize) -> Vec<String> {
    let mut kept = HashSet::new();
    results
        .iter()
        .chain(seen)
        .filter(|item| kept.insert(item.as_str()))
        .take(capacity)
        .cloned()
        .collect()
}
