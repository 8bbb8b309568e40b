use crate::fetcher::build_client;
use crate::traits::ContentSource;
use crate::types::{AggregatorError, FetchConfig, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://e621.net";
const POST_URL_PREFIX: &str = "https://e621.net/post/show/";
/// The posts index refuses limits above this
const MAXIMUM_NUMBER_POSTS: usize = 300;

#[derive(Debug, Deserialize)]
struct E621Post {
    id: u64,
}

/// e621 tag search through the JSON posts index
pub struct E621Source {
    client: Client,
    base_url: String,
    page_size: usize,
}

impl E621Source {
    pub fn new(base_url: Option<String>, page_size: Option<usize>, fetch_config: &FetchConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(fetch_config)?,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            page_size: page_size.unwrap_or(MAXIMUM_NUMBER_POSTS).min(MAXIMUM_NUMBER_POSTS),
        })
    }

    /// Turn a posts index response into post URLs, keeping response order.
    pub fn parse_posts(body: &str) -> Result<Vec<String>> {
        let posts: Vec<E621Post> = serde_json::from_str(body)
            .map_err(|e| AggregatorError::Parse(format!("e621 posts index: {}", e)))?;
        Ok(posts
            .into_iter()
            .map(|post| format!("{}{}", POST_URL_PREFIX, post.id))
            .collect())
    }
}

#[async_trait]
impl ContentSource for E621Source {
    fn name(&self) -> &str {
        "e621"
    }

    fn max_page_size(&self) -> usize {
        self.page_size
    }

    async fn fetch_page(&self, tag: &str, page_size: usize, page: u32) -> Result<Vec<String>> {
        let url = format!("{}/post/index.json", self.base_url);
        let limit = page_size.min(self.page_size).to_string();
        let page = page.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[("tags", tag), ("limit", limit.as_str()), ("page", page.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AggregatorError::General(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body = response.text().await?;
        debug!("e621 returned {} bytes for [{}]", body.len(), tag);
        Self::parse_posts(&body)
    }
}
