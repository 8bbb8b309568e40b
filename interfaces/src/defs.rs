use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where updates for a subscription get delivered.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Destination {
    Direct { user_id: u64 },
    Channel { guild_id: u64, channel_id: u64 },
}

impl Destination {
    pub fn is_private(&self) -> bool {
        matches!(self, Destination::Direct { .. })
    }

    /// Partition key shared by every subscription delivered to this destination.
    pub fn scope_key(&self) -> String {
        match self {
            Destination::Direct { user_id } => format!("private+{}", user_id),
            Destination::Channel { guild_id, channel_id } => format!("guild+{}+{}", guild_id, channel_id),
        }
    }

    pub fn from_scope_key(scope_key: &str) -> Option<Self> {
        let mut parts = scope_key.split('+');
        let destination = match parts.next()? {
            "private" => Destination::Direct {
                user_id: parts.next()?.parse().ok()?,
            },
            "guild" => Destination::Channel {
                guild_id: parts.next()?.parse().ok()?,
                channel_id: parts.next()?.parse().ok()?,
            },
            _ => return None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(destination)
    }
}

/// A standing search. `(scope_key, query)` is unique across the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub scope_key: String,
    pub query: String,
    pub destination: Destination,
    /// Item identifiers already seen, newest first.
    pub seen_cache: Vec<String>,
    pub cache_initialized: bool,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    pub fn new(query: impl Into<String>, destination: Destination) -> Self {
        Self {
            scope_key: destination.scope_key(),
            query: query.into(),
            destination,
            seen_cache: Vec::new(),
            cache_initialized: false,
            created_at: Utc::now(),
        }
    }

    pub fn cache_update(&self, seen_cache: Vec<String>) -> SubscriptionCacheUpdate {
        SubscriptionCacheUpdate {
            scope_key: self.scope_key.clone(),
            query: self.query.clone(),
            seen_cache,
            cache_initialized: true,
        }
    }
}

/// Partial update applied by the poller. Nothing outside these fields changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionCacheUpdate {
    pub scope_key: String,
    pub query: String,
    pub seen_cache: Vec<String>,
    pub cache_initialized: bool,
}

/// Delivers batches of text lines to a user or channel.
///
/// Callers are responsible for keeping each batch under the platform's
/// per-message line limit.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, destination: &Destination, lines: &[String]) -> Result<()>;
}
