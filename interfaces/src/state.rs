use async_trait::async_trait;

use crate::defs::Subscription;
use crate::defs::SubscriptionCacheUpdate;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("subscription already exists: {scope_key} / {query}")]
    AlreadyExists { scope_key: String, query: String },

    #[error("subscription not found: {scope_key} / {query}")]
    NotFound { scope_key: String, query: String },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persistent table of subscriptions, partitioned by scope key and keyed by query.
///
/// No operation is atomic with another; `get` followed by `merge_update` can race.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Fails with `AlreadyExists` when `(scope_key, query)` is taken.
    async fn insert(&self, subscription: &Subscription) -> StoreResult<()>;

    async fn scan(&self, scope_key: &str) -> StoreResult<Vec<Subscription>>;

    async fn scan_all(&self) -> StoreResult<Vec<Subscription>>;

    async fn get(&self, scope_key: &str, query: &str) -> StoreResult<Option<Subscription>>;

    /// Writes only the cache fields. Fails with `NotFound` if the record is gone.
    async fn merge_update(&self, update: &SubscriptionCacheUpdate) -> StoreResult<()>;

    /// Returns whether a record was deleted.
    async fn delete(&self, scope_key: &str, query: &str) -> StoreResult<bool>;
}
