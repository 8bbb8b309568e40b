use serde::{Deserialize, Serialize};
use std::fmt;
// Use the interfaces crate for the shared data model and collaborator seams
pub use interfaces::defs::{Destination, Notifier, Subscription, SubscriptionCacheUpdate};
pub use interfaces::state::{StoreError, StoreResult, SubscriptionStore};

/// HTTP settings for a single content source client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Tag-Aggregator/1.0".to_string(),
            timeout_seconds: 30,
            max_redirects: 5,
        }
    }
}

/// Result of a one-shot random lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RandomPick {
    Item(String),
    EmptyQuery,
    NoResults,
}

impl fmt::Display for RandomPick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RandomPick::Item(item) => write!(f, "{}", item),
            RandomPick::EmptyQuery => write!(f, "Query is empty"),
            RandomPick::NoResults => write!(f, "No posts matched your search."),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscribeOutcome {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

/// What a single poll did to one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// First poll: cache filled, nothing sent.
    Primed { cached: usize },
    /// Nothing new; no write, no notification.
    Unchanged,
    Updated { new_items: Vec<String> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub processed: usize,
    pub primed: usize,
    pub updated: usize,
    pub failed: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Response parse error: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Notification failed: {0}")]
    Notify(#[source] anyhow::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Query is empty")]
    EmptyQuery,

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
