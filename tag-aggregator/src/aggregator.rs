use crate::fetcher::RateLimitedSource;
use futures::future::join_all;
use tracing::{debug, info};

/// Fans a tag query out to every registered source at once.
///
/// Each source has its own throttle gate, so sources never wait on each
/// other. A failing source contributes an empty list.
pub struct SourceAggregator {
    sources: Vec<RateLimitedSource>,
}

impl SourceAggregator {
    pub fn new(sources: Vec<RateLimitedSource>) -> Self {
        info!("Source aggregator with {} sources", sources.len());
        Self { sources }
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    async fn fetch_per_source(&self, tag: &str, limit: usize) -> Vec<Vec<String>> {
        let results = join_all(self.sources.iter().map(|source| source.fetch_all(tag, limit))).await;
        for (source, items) in self.sources.iter().zip(&results) {
            debug!("{} returned {} items for [{}]", source.name(), items.len(), tag);
        }
        results
    }

    /// Every source's results, concatenated in registration order.
    pub async fn query_flat(&self, tag: &str, limit: usize) -> Vec<String> {
        self.fetch_per_source(tag, limit).await.concat()
    }

    /// Round-robin merge of the per-source results, so that a capped prefix
    /// holds a fair share from every source.
    pub async fn query_interleaved(&self, tag: &str, limit_per_source: usize) -> Vec<String> {
        interleave(self.fetch_per_source(tag, limit_per_source).await)
    }
}

/// Take the first item of each list in order, then the second, and so on.
/// Shorter lists drop out once exhausted.
pub fn interleave<T>(lists: Vec<Vec<T>>) -> Vec<T> {
    let total = lists.iter().map(Vec::len).sum();
    let mut iters: Vec<_> = lists.into_iter().map(Vec::into_iter).collect();
    let mut merged = Vec::with_capacity(total);

    while merged.len() < total {
        for iter in iters.iter_mut() {
            if let Some(item) = iter.next() {
                merged.push(item);
            }
        }
    }

    merged
}
