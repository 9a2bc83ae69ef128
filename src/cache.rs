use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::error::ApiError;

/// Key-value cache with TTL and prefix deletion. Kept behind a trait object
/// so tests and the fake app state can swap in an in-memory store.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> anyhow::Result<()>;
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
    async fn delete_prefix(&self, prefix: &str) -> anyhow::Result<()>;
}

pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut con = self.manager.clone();
        let value: Option<String> = con.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> anyhow::Result<()> {
        let mut con = self.manager.clone();
        con.set_ex::<_, _, ()>(key, value, ttl_seconds).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let mut con = self.manager.clone();
        con.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> anyhow::Result<()> {
        let mut scan_con = self.manager.clone();
        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter: redis::AsyncIter<'_, String> =
                scan_con.scan_match(format!("{prefix}*")).await?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }
        let mut con = self.manager.clone();
        for key in keys {
            con.del::<_, ()>(key).await?;
        }
        Ok(())
    }
}

/// Process-local store used by unit tests and `AppState::fake`.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut entries = self.entries.lock().unwrap();
        if let Some((value, expires_at)) = entries.get(key) {
            if *expires_at > Instant::now() {
                return Ok(Some(value.clone()));
            }
        }
        entries.remove(key);
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> anyhow::Result<()> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_seconds);
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> anyhow::Result<()> {
        self.entries
            .lock()
            .unwrap()
            .retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }
}

/// How an invalidation targets the keyspace. List-style reads are cached per
/// (offset, limit) pair, so a mutation to the resource must clear every key
/// sharing the base prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationScope {
    Exact,
    Prefix,
}

pub async fn invalidate(
    store: &dyn CacheStore,
    key: &str,
    scope: InvalidationScope,
) -> Result<(), ApiError> {
    let result = match scope {
        InvalidationScope::Exact => store.delete(key).await,
        InvalidationScope::Prefix => store.delete_prefix(key).await,
    };
    result.map_err(ApiError::internal)
}

/// Cache key for a paginated read of `base`.
pub fn paginated_key(base: &str, offset: i64, limit: i64) -> String {
    format!("{base}_offset_{offset}_limit_{limit}")
}

/// Read-through lookup: on a hit the cached value is already the serialized
/// wire projection and is returned as-is; on a miss `compute` yields the
/// internal entities, which are projected, stored under `key` for
/// `ttl_seconds`, and returned. Errors from `compute` keep their typing;
/// cache-layer failures surface as internal errors.
pub async fn read_through<E, P, F, Fut>(
    store: &dyn CacheStore,
    key: &str,
    ttl_seconds: u64,
    compute: F,
) -> Result<Vec<P>, ApiError>
where
    P: From<E> + Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<E>, ApiError>>,
{
    if let Some(cached) = store.get(key).await.map_err(ApiError::internal)? {
        debug!(key, "cache hit");
        let hit: Vec<P> = serde_json::from_str(&cached).map_err(ApiError::internal)?;
        return Ok(hit);
    }

    debug!(key, "cache miss");
    let entities = compute().await?;
    let projected: Vec<P> = entities.into_iter().map(P::from).collect();

    let payload = serde_json::to_string(&projected).map_err(ApiError::internal)?;
    store
        .set_ex(key, &payload, ttl_seconds)
        .await
        .map_err(ApiError::internal)?;
    Ok(projected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone)]
    struct Entity {
        value: i32,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Projection {
        value: i32,
    }

    impl From<Entity> for Projection {
        fn from(e: Entity) -> Self {
            Projection { value: e.value }
        }
    }

    #[tokio::test]
    async fn read_through_stores_on_miss_and_serves_on_hit() {
        let store = MemoryCache::default();

        let miss = read_through::<Entity, Projection, _, _>(&store, "k", 60, || async {
            Ok(vec![Entity { value: 1 }, Entity { value: 2 }])
        })
        .await
        .expect("miss path");
        assert_eq!(miss, vec![Projection { value: 1 }, Projection { value: 2 }]);

        // second call must not invoke compute
        let hit = read_through::<Entity, Projection, _, _>(&store, "k", 60, || async {
            panic!("compute called on a hit")
        })
        .await
        .expect("hit path");
        assert_eq!(hit, vec![Projection { value: 1 }, Projection { value: 2 }]);
    }

    #[tokio::test]
    async fn read_through_propagates_typed_errors() {
        let store = MemoryCache::default();
        let err = read_through::<Entity, Projection, _, _>(&store, "k", 60, || async {
            Err(ApiError::NotFound("missing".into()))
        })
        .await
        .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalidate_exact_removes_single_key() {
        let store = MemoryCache::default();
        store.set_ex("users_offset_0_limit_100", "[]", 60).await.unwrap();
        store.set_ex("users_offset_100_limit_100", "[]", 60).await.unwrap();

        invalidate(&store, "users_offset_0_limit_100", InvalidationScope::Exact)
            .await
            .unwrap();
        assert!(store.get("users_offset_0_limit_100").await.unwrap().is_none());
        assert!(store.get("users_offset_100_limit_100").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn invalidate_prefix_removes_every_paginated_key() {
        let store = MemoryCache::default();
        store.set_ex("users_offset_0_limit_100", "[]", 60).await.unwrap();
        store.set_ex("users_offset_100_limit_50", "[]", 60).await.unwrap();
        store.set_ex("other", "[]", 60).await.unwrap();

        invalidate(&store, "users", InvalidationScope::Prefix)
            .await
            .unwrap();
        assert!(store.get("users_offset_0_limit_100").await.unwrap().is_none());
        assert!(store.get("users_offset_100_limit_50").await.unwrap().is_none());
        assert!(store.get("other").await.unwrap().is_some());
    }

    #[test]
    fn paginated_key_embeds_offset_and_limit() {
        assert_eq!(paginated_key("users", 0, 100), "users_offset_0_limit_100");
        assert_eq!(paginated_key("users", 20, 5), "users_offset_20_limit_5");
    }
}
