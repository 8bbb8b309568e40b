use crate::aggregator::SourceAggregator;
use crate::config::EngineConfig;
use crate::poller::{PollerConfig, SubscriptionPoller};
use crate::types::{
    AggregatorError, Destination, Notifier, RandomPick, RemoveOutcome, Result, StoreError,
    SubscribeOutcome, Subscription, SubscriptionStore,
};
use rand::seq::SliceRandom;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Entry points for the command layer: one-shot lookups, subscription
/// management, and starting the background poller.
pub struct SubscriptionService {
    aggregator: Arc<SourceAggregator>,
    store: Arc<dyn SubscriptionStore>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
}

impl SubscriptionService {
    pub fn new(
        aggregator: Arc<SourceAggregator>,
        store: Arc<dyn SubscriptionStore>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
    ) -> Self {
        Self {
            aggregator,
            store,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Pick one item uniformly from every source's results. Nothing is cached.
    pub async fn get_random_item(&self, query: &str) -> RandomPick {
        if query.trim().is_empty() {
            return RandomPick::EmptyQuery;
        }

        let items = self.aggregator.query_flat(query, self.config.random_max).await;
        debug!("Random pick for [{}] over {} items", query, items.len());

        // thread_rng is a CSPRNG seeded from the OS, one per thread
        match items.choose(&mut rand::thread_rng()) {
            Some(item) => RandomPick::Item(item.clone()),
            None => RandomPick::NoResults,
        }
    }

    pub async fn subscribe(&self, query: &str, destination: &Destination) -> Result<SubscribeOutcome> {
        if query.trim().is_empty() {
            return Err(AggregatorError::EmptyQuery);
        }

        let subscription = Subscription::new(query, destination.clone());
        match self.store.insert(&subscription).await {
            Ok(()) => {
                info!("Subscribed {} to [{}]", subscription.scope_key, query);
                Ok(SubscribeOutcome::Created)
            }
            Err(StoreError::AlreadyExists { .. }) => Ok(SubscribeOutcome::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_subscriptions(&self, scope_key: &str) -> Result<Vec<String>> {
        let subscriptions = self.store.scan(scope_key).await?;
        Ok(subscriptions.into_iter().map(|s| s.query).collect())
    }

    pub async fn remove_subscription(&self, query: &str, scope_key: &str) -> Result<RemoveOutcome> {
        if self.store.get(scope_key, query).await?.is_none() {
            return Ok(RemoveOutcome::NotFound);
        }

        if self.store.delete(scope_key, query).await? {
            info!("Unsubscribed {} from [{}]", scope_key, query);
            Ok(RemoveOutcome::Removed)
        } else {
            Ok(RemoveOutcome::NotFound)
        }
    }

    pub fn poller(&self) -> SubscriptionPoller {
        SubscriptionPoller::new(
            self.aggregator.clone(),
            self.store.clone(),
            self.notifier.clone(),
            PollerConfig::from(&self.config),
        )
    }

    /// Start the background poll loop. Call once; every call adds a loop.
    pub fn start_polling(&self) -> JoinHandle<()> {
        Arc::new(self.poller()).spawn()
    }
}
