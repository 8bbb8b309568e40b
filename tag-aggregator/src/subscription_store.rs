use crate::types::{
    Destination, StoreError, StoreResult, Subscription, SubscriptionCacheUpdate, SubscriptionStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

/// Postgres-backed subscription table.
pub struct PgSubscriptionStore {
    db: PgPool,
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.into())
}

/// Rebuild a destination from the stored identity columns. Ids are kept as
/// text so large snowflakes survive untouched.
fn destination_from_columns(
    is_private: bool,
    user_id: Option<&str>,
    guild_id: Option<&str>,
    channel_id: Option<&str>,
) -> StoreResult<Destination> {
    let parse = |column: &str, value: Option<&str>| -> StoreResult<u64> {
        value
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| StoreError::Backend(anyhow::anyhow!("invalid {} column: {:?}", column, value)))
    };

    if is_private {
        Ok(Destination::Direct {
            user_id: parse("user_id", user_id)?,
        })
    } else {
        Ok(Destination::Channel {
            guild_id: parse("guild_id", guild_id)?,
            channel_id: parse("channel_id", channel_id)?,
        })
    }
}

fn subscription_from_row(row: &PgRow) -> StoreResult<Subscription> {
    let user_id: Option<String> = row.try_get("user_id").map_err(backend)?;
    let guild_id: Option<String> = row.try_get("guild_id").map_err(backend)?;
    let channel_id: Option<String> = row.try_get("channel_id").map_err(backend)?;
    let destination = destination_from_columns(
        row.try_get("is_private").map_err(backend)?,
        user_id.as_deref(),
        guild_id.as_deref(),
        channel_id.as_deref(),
    )?;
    let Json(seen_cache): Json<Vec<String>> = row.try_get("seen_cache").map_err(backend)?;

    Ok(Subscription {
        scope_key: row.try_get("scope_key").map_err(backend)?,
        query: row.try_get("query").map_err(backend)?,
        destination,
        seen_cache,
        cache_initialized: row.try_get("cache_initialized").map_err(backend)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(backend)?,
    })
}

impl PgSubscriptionStore {
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let db = PgPool::connect(database_url).await.map_err(backend)?;
        Ok(Self { db })
    }

    pub fn from_pool(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn setup_schema(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                scope_key TEXT NOT NULL,
                query TEXT NOT NULL,
                is_private BOOLEAN NOT NULL,
                user_id TEXT,
                guild_id TEXT,
                channel_id TEXT,
                seen_cache JSONB NOT NULL DEFAULT '[]'::jsonb,
                cache_initialized BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                PRIMARY KEY (scope_key, query)
            )
            "#,
        )
        .execute(&self.db)
        .await
        .map_err(backend)?;

        info!("Subscription table ready");
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn insert(&self, subscription: &Subscription) -> StoreResult<()> {
        let (user_id, guild_id, channel_id) = match &subscription.destination {
            Destination::Direct { user_id } => (Some(user_id.to_string()), None, None),
            Destination::Channel { guild_id, channel_id } => {
                (None, Some(guild_id.to_string()), Some(channel_id.to_string()))
            }
        };

        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions
                (scope_key, query, is_private, user_id, guild_id, channel_id, seen_cache, cache_initialized, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            ON CONFLICT (scope_key, query) DO NOTHING
            "#,
        )
        .bind(&subscription.scope_key)
        .bind(&subscription.query)
        .bind(subscription.destination.is_private())
        .bind(user_id)
        .bind(guild_id)
        .bind(channel_id)
        .bind(Json(&subscription.seen_cache))
        .bind(subscription.cache_initialized)
        .bind(subscription.created_at)
        .execute(&self.db)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists {
                scope_key: subscription.scope_key.clone(),
                query: subscription.query.clone(),
            });
        }

        info!("Added subscription [{}] for {}", subscription.query, subscription.scope_key);
        Ok(())
    }

    async fn scan(&self, scope_key: &str) -> StoreResult<Vec<Subscription>> {
        let rows = sqlx::query("SELECT * FROM subscriptions WHERE scope_key = $1 ORDER BY created_at, query")
            .bind(scope_key)
            .fetch_all(&self.db)
            .await
            .map_err(backend)?;

        rows.iter().map(subscription_from_row).collect()
    }

    async fn scan_all(&self) -> StoreResult<Vec<Subscription>> {
        let rows = sqlx::query("SELECT * FROM subscriptions ORDER BY scope_key, query")
            .fetch_all(&self.db)
            .await
            .map_err(backend)?;

        debug!("Loaded {} subscriptions", rows.len());
        rows.iter().map(subscription_from_row).collect()
    }

    async fn get(&self, scope_key: &str, query: &str) -> StoreResult<Option<Subscription>> {
        let row = sqlx::query("SELECT * FROM subscriptions WHERE scope_key = $1 AND query = $2")
            .bind(scope_key)
            .bind(query)
            .fetch_optional(&self.db)
            .await
            .map_err(backend)?;

        row.as_ref().map(subscription_from_row).transpose()
    }

    async fn merge_update(&self, update: &SubscriptionCacheUpdate) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET seen_cache = $1, cache_initialized = $2, updated_at = NOW()
            WHERE scope_key = $3 AND query = $4
            "#,
        )
        .bind(Json(&update.seen_cache))
        .bind(update.cache_initialized)
        .bind(&update.scope_key)
        .bind(&update.query)
        .execute(&self.db)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                scope_key: update.scope_key.clone(),
                query: update.query.clone(),
            });
        }

        debug!("Updated cache for [{}] in {} ({} entries)", update.query, update.scope_key, update.seen_cache.len());
        Ok(())
    }

    async fn delete(&self, scope_key: &str, query: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE scope_key = $1 AND query = $2")
            .bind(scope_key)
            .bind(query)
            .execute(&self.db)
            .await
            .map_err(backend)?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!("Removed subscription [{}] for {}", query, scope_key);
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_rows_use_the_user_column() {
        let dest = destination_from_columns(true, Some("42"), None, None).unwrap();
        assert_eq!(dest, Destination::Direct { user_id: 42 });
    }

    #[test]
    fn channel_rows_need_guild_and_channel() {
        let dest = destination_from_columns(false, Some("42"), Some("7"), Some("99")).unwrap();
        assert_eq!(dest, Destination::Channel { guild_id: 7, channel_id: 99 });

        let err = destination_from_columns(false, None, Some("7"), None).unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[test]
    fn garbage_ids_are_backend_errors() {
        assert!(destination_from_columns(true, Some("abc"), None, None).is_err());
    }
}
