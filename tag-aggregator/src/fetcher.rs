use crate::traits::ContentSource;
use crate::types::{FetchConfig, Result};
use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub fn build_client(config: &FetchConfig) -> Result<Client> {
    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_seconds))
        .gzip(true)
        .deflate(true)
        .brotli(true)
        .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
        .build()?;
    Ok(client)
}

/// One-at-a-time admission for a single source.
///
/// The lock is held for the request and for `interval` after it finishes,
/// whether it succeeded or not.
pub struct ThrottleGate {
    lock: Mutex<()>,
    interval: Duration,
}

impl ThrottleGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            lock: Mutex::new(()),
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn run<F, T>(&self, request: F) -> T
    where
        F: Future<Output = T>,
    {
        let _guard = self.lock.lock().await;
        let output = request.await;
        tokio::time::sleep(self.interval).await;
        output
    }
}

/// A content source behind its own throttle gate.
///
/// Fetch failures never escape this type: they are logged and reported as an
/// empty page, which callers treat the same as the end of the results.
pub struct RateLimitedSource {
    source: Arc<dyn ContentSource>,
    gate: ThrottleGate,
}

impl RateLimitedSource {
    pub fn new(source: Arc<dyn ContentSource>, throttle: Duration) -> Self {
        Self {
            source,
            gate: ThrottleGate::new(throttle),
        }
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub async fn fetch(&self, tag: &str, page_size: usize, page: u32) -> Vec<String> {
        debug!("Fetching {} page {} for [{}] (size {})", self.name(), page, tag, page_size);

        match self.gate.run(self.source.fetch_page(tag, page_size, page)).await {
            Ok(items) => items,
            Err(e) => {
                warn!("Fetch from {} failed for [{}] page {}: {}", self.name(), tag, page, e);
                Vec::new()
            }
        }
    }

    /// Paginate until `max_items` are collected or a page comes back empty.
    ///
    /// Sites offset by `(page - 1) * page_size`, so every page is requested at
    /// the same size and the surplus is cut afterwards.
    pub async fn fetch_all(&self, tag: &str, max_items: usize) -> Vec<String> {
        let page_size = self.source.max_page_size().max(1).min(max_items.max(1));
        let mut items = Vec::new();
        let mut page = 1;

        while items.len() < max_items {
            let current = self.fetch(tag, page_size, page).await;
            if current.is_empty() {
                break;
            }
            items.extend(current);
            page += 1;
        }

        items.truncate(max_items);
        debug!("Collected {} items from {} for [{}]", items.len(), self.name(), tag);
        items
    }
}
