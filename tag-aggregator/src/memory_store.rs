use crate::types::{StoreError, StoreResult, Subscription, SubscriptionCacheUpdate, SubscriptionStore};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

type Key = (String, String);

/// Process-local subscription table. Contents are lost on restart.
#[derive(Default)]
pub struct MemorySubscriptionStore {
    records: RwLock<BTreeMap<Key, Subscription>>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn key(scope_key: &str, query: &str) -> Key {
    (scope_key.to_string(), query.to_string())
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn insert(&self, subscription: &Subscription) -> StoreResult<()> {
        let mut records = self.records.write().await;
        let key = key(&subscription.scope_key, &subscription.query);
        if records.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                scope_key: key.0,
                query: key.1,
            });
        }
        records.insert(key, subscription.clone());
        Ok(())
    }

    async fn scan(&self, scope_key: &str) -> StoreResult<Vec<Subscription>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|s| s.scope_key == scope_key)
            .cloned()
            .collect())
    }

    async fn scan_all(&self) -> StoreResult<Vec<Subscription>> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn get(&self, scope_key: &str, query: &str) -> StoreResult<Option<Subscription>> {
        Ok(self.records.read().await.get(&key(scope_key, query)).cloned())
    }

    async fn merge_update(&self, update: &SubscriptionCacheUpdate) -> StoreResult<()> {
        let mut records = self.records.write().await;
        match records.get_mut(&key(&update.scope_key, &update.query)) {
            Some(record) => {
                record.seen_cache = update.seen_cache.clone();
                record.cache_initialized = update.cache_initialized;
                Ok(())
            }
            None => Err(StoreError::NotFound {
                scope_key: update.scope_key.clone(),
                query: update.query.clone(),
            }),
        }
    }

    async fn delete(&self, scope_key: &str, query: &str) -> StoreResult<bool> {
        Ok(self.records.write().await.remove(&key(scope_key, query)).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Destination;

    #[tokio::test]
    async fn insert_rejects_duplicate_keys() {
        let store = MemorySubscriptionStore::new();
        let sub = Subscription::new("fox", Destination::Direct { user_id: 42 });

        store.insert(&sub).await.unwrap();
        let err = store.insert(&sub).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));

        // same query, different scope is a different subscription
        let other = Subscription::new("fox", Destination::Direct { user_id: 43 });
        store.insert(&other).await.unwrap();
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn scan_is_limited_to_one_scope() {
        let store = MemorySubscriptionStore::new();
        let dm = Destination::Direct { user_id: 42 };
        let channel = Destination::Channel { guild_id: 1, channel_id: 2 };
        for (query, dest) in [("wolf", &dm), ("fox", &dm), ("fox", &channel)] {
            store.insert(&Subscription::new(query, dest.clone())).await.unwrap();
        }

        let queries: Vec<_> = store.scan("private+42").await.unwrap().into_iter().map(|s| s.query).collect();
        assert_eq!(queries, vec!["fox", "wolf"]);
        assert_eq!(store.scan_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn merge_update_touches_only_cache_fields() {
        let store = MemorySubscriptionStore::new();
        let sub = Subscription::new("fox", Destination::Direct { user_id: 42 });
        store.insert(&sub).await.unwrap();

        store.merge_update(&sub.cache_update(vec!["a".to_string()])).await.unwrap();
        let stored = store.get("private+42", "fox").await.unwrap().unwrap();
        assert_eq!(stored.seen_cache, vec!["a"]);
        assert!(stored.cache_initialized);
        assert_eq!(stored.created_at, sub.created_at);
        assert_eq!(stored.destination, sub.destination);
    }

    #[tokio::test]
    async fn merge_update_of_deleted_record_fails() {
        let store = MemorySubscriptionStore::new();
        let sub = Subscription::new("fox", Destination::Direct { user_id: 42 });
        store.insert(&sub).await.unwrap();
        assert!(store.delete("private+42", "fox").await.unwrap());
        assert!(!store.delete("private+42", "fox").await.unwrap());

        let err = store.merge_update(&sub.cache_update(vec![])).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
