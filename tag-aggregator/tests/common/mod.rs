#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tag_aggregator::{
    AggregatorError, ContentSource, Destination, MemorySubscriptionStore, Notifier,
    RateLimitedSource, Result, SourceAggregator, StoreError, StoreResult, Subscription,
    SubscriptionCacheUpdate, SubscriptionStore,
};

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// In-process source whose result list can be swapped between polls.
pub struct ScriptedSource {
    name: String,
    page_limit: usize,
    items: Mutex<Vec<String>>,
    failing: AtomicBool,
    requests: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(name: &str, items: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            page_limit: 2,
            items: Mutex::new(items.iter().map(|s| s.to_string()).collect()),
            failing: AtomicBool::new(false),
            requests: AtomicUsize::new(0),
        })
    }

    pub fn failing(name: &str) -> Arc<Self> {
        let source = Self::new(name, &[]);
        source.set_failing(true);
        source
    }

    pub fn set_items(&self, items: &[&str]) {
        *self.items.lock().unwrap() = items.iter().map(|s| s.to_string()).collect();
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentSource for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn max_page_size(&self) -> usize {
        self.page_limit
    }

    async fn fetch_page(&self, _tag: &str, page_size: usize, page: u32) -> Result<Vec<String>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(AggregatorError::General("connection reset".to_string()));
        }
        let items = self.items.lock().unwrap();
        let start = ((page as usize - 1) * self.page_limit).min(items.len());
        let end = (start + page_size).min(items.len());
        Ok(items[start..end].to_vec())
    }
}

pub fn aggregator(sources: &[Arc<ScriptedSource>]) -> Arc<SourceAggregator> {
    let sources = sources
        .iter()
        .map(|s| RateLimitedSource::new(s.clone() as Arc<dyn ContentSource>, Duration::from_millis(100)))
        .collect();
    Arc::new(SourceAggregator::new(sources))
}

/// Keeps every delivered chunk.
#[derive(Default)]
pub struct RecordingNotifier {
    deliveries: Mutex<Vec<(Destination, Vec<String>)>>,
}

impl RecordingNotifier {
    pub fn deliveries(&self) -> Vec<(Destination, Vec<String>)> {
        self.deliveries.lock().unwrap().clone()
    }

    /// Every delivered line except the update headers.
    pub fn delivered_items(&self) -> Vec<String> {
        self.deliveries()
            .into_iter()
            .flat_map(|(_, lines)| lines)
            .filter(|line| !line.starts_with("Subscription update for"))
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, destination: &Destination, lines: &[String]) -> anyhow::Result<()> {
        self.deliveries
            .lock()
            .unwrap()
            .push((destination.clone(), lines.to_vec()));
        Ok(())
    }
}

/// Memory store that counts writes and can be told to fail.
#[derive(Default)]
pub struct CountingStore {
    inner: MemorySubscriptionStore,
    pub merges: AtomicUsize,
    pub deletes: AtomicUsize,
    pub inserts: AtomicUsize,
    /// Queries whose merge_update fails
    pub broken_queries: Mutex<Vec<String>>,
    /// Number of upcoming scan_all calls that fail
    pub failing_scans: AtomicUsize,
    pub failing_inserts: AtomicBool,
}

impl CountingStore {
    pub fn merges(&self) -> usize {
        self.merges.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub async fn record(&self, scope_key: &str, query: &str) -> Subscription {
        self.inner.get(scope_key, query).await.unwrap().unwrap()
    }
}

fn outage() -> StoreError {
    StoreError::Backend(anyhow::anyhow!("table service unavailable"))
}

#[async_trait]
impl SubscriptionStore for CountingStore {
    async fn insert(&self, subscription: &Subscription) -> StoreResult<()> {
        if self.failing_inserts.load(Ordering::SeqCst) {
            return Err(outage());
        }
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(subscription).await
    }

    async fn scan(&self, scope_key: &str) -> StoreResult<Vec<Subscription>> {
        self.inner.scan(scope_key).await
    }

    async fn scan_all(&self) -> StoreResult<Vec<Subscription>> {
        let pending = self.failing_scans.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_scans.store(pending - 1, Ordering::SeqCst);
            return Err(outage());
        }
        self.inner.scan_all().await
    }

    async fn get(&self, scope_key: &str, query: &str) -> StoreResult<Option<Subscription>> {
        self.inner.get(scope_key, query).await
    }

    async fn merge_update(&self, update: &SubscriptionCacheUpdate) -> StoreResult<()> {
        if self.broken_queries.lock().unwrap().contains(&update.query) {
            return Err(outage());
        }
        self.merges.fetch_add(1, Ordering::SeqCst);
        self.inner.merge_update(update).await
    }

    async fn delete(&self, scope_key: &str, query: &str) -> StoreResult<bool> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(scope_key, query).await
    }
}
