use crate::types::Result;
use async_trait::async_trait;

/// A site that can be searched by tag, one page at a time.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Human-readable name used in logs
    fn name(&self) -> &str;

    /// Largest page the site will return for a single request
    fn max_page_size(&self) -> usize;

    /// Fetch one page of item identifiers, newest first. Pages start at 1.
    /// An empty page marks the end of the results.
    async fn fetch_page(&self, tag: &str, page_size: usize, page: u32) -> Result<Vec<String>>;
}
