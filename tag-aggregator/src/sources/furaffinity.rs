use crate::fetcher::build_client;
use crate::traits::ContentSource;
use crate::types::{AggregatorError, FetchConfig, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

/// FAExport mirror; FurAffinity itself has no search API
pub const DEFAULT_BASE_URL: &str = "http://faexport.boothale.net";
const VIEW_URL_PREFIX: &str = "https://www.furaffinity.net/view/";
/// FAExport serves fixed-size pages
const PAGE_SIZE: usize = 60;

/// FurAffinity search through an FAExport instance
pub struct FurAffinitySource {
    client: Client,
    base_url: String,
}

impl FurAffinitySource {
    pub fn new(base_url: Option<String>, fetch_config: &FetchConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(fetch_config)?,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    /// FAExport answers with a bare array of submission ids.
    pub fn parse_submissions(body: &str) -> Result<Vec<String>> {
        let ids: Vec<String> = serde_json::from_str(body)
            .map_err(|e| AggregatorError::Parse(format!("FAExport search: {}", e)))?;
        Ok(ids
            .into_iter()
            .map(|id| format!("{}{}", VIEW_URL_PREFIX, id))
            .collect())
    }
}

#[async_trait]
impl ContentSource for FurAffinitySource {
    fn name(&self) -> &str {
        "furaffinity"
    }

    fn max_page_size(&self) -> usize {
        PAGE_SIZE
    }

    // The requested size is ignored; FAExport always returns full pages and
    // the caller truncates.
    async fn fetch_page(&self, tag: &str, _page_size: usize, page: u32) -> Result<Vec<String>> {
        let url = format!("{}/search.json", self.base_url);
        let per_page = PAGE_SIZE.to_string();
        let page = page.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[("perpage", per_page.as_str()), ("page", page.as_str()), ("q", tag)])
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
        debug!("FAExport returned {} bytes for [{}]", body.len(), tag);
        Self::parse_submissions(&body)
    }
}
