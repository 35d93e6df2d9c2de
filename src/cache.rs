//! TTL key-value cache port, Redis-compatible semantics. One real backend
//! (`RedisCache`) and one in-process stand-in (`InMemoryCache`) for tests
//! and the local dev binaries, matching the teacher's `src/bin/local_*`
//! tooling convention.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::errors::TransientError;

#[async_trait]
pub trait Cache: Send + Sync {
  async fn get_raw(&self, key: &str) -> Result<Option<String>, TransientError>;
  async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), TransientError>;
  /// Attempts to acquire an exclusive lease on `key` for `ttl`. Returns
  /// `true` if this call won the lease, `false` if another holder has it.
  async fn acquire_lease(&self, key: &str, ttl: Duration) -> Result<bool, TransientError>;
  async fn release_lease(&self, key: &str) -> Result<(), TransientError>;
}

pub async fn get<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Result<Option<T>, TransientError> {
  match cache.get_raw(key).await? {
    Some(raw) => Ok(serde_json::from_str(&raw).ok()),
    None => Ok(None),
  }
}

pub async fn set<T: Serialize>(cache: &dyn Cache, key: &str, value: &T, ttl: Duration) -> Result<(), TransientError> {
  let raw = serde_json::to_string(value).map_err(|e| TransientError::CacheUnavailable(e.to_string()))?;
  cache.set_raw(key, raw, ttl).await
}

pub struct RedisCache {
  connection: Mutex<redis::aio::MultiplexedConnection>,
}

impl RedisCache {
  pub async fn connect(redis_url: &str) -> Result<Self, TransientError> {
    let client = redis::Client::open(redis_url).map_err(|e| TransientError::CacheUnavailable(e.to_string()))?;
    let connection = client
      .get_multiplexed_tokio_connection()
      .await
      .map_err(|e| TransientError::CacheUnavailable(e.to_string()))?;
    Ok(RedisCache { connection: Mutex::new(connection) })
  }
}

#[async_trait]
impl Cache for RedisCache {
  async fn get_raw(&self, key: &str) -> Result<Option<String>, TransientError> {
    use redis::AsyncCommands;
    let mut conn = self.connection.lock().await;
    conn
      .get(key)
      .await
      .map_err(|e| TransientError::CacheUnavailable(e.to_string()))
  }

  async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), TransientError> {
    use redis::AsyncCommands;
    let mut conn = self.connection.lock().await;
    let _: () = conn
      .set_ex(key, value, ttl.as_secs().max(1))
      .await
      .map_err(|e| TransientError::CacheUnavailable(e.to_string()))?;
    Ok(())
  }

  async fn acquire_lease(&self, key: &str, ttl: Duration) -> Result<bool, TransientError> {
    let mut conn = self.connection.lock().await;
    let result: redis::RedisResult<Option<String>> = redis::cmd("SET")
      .arg(key)
      .arg("locked")
      .arg("NX")
      .arg("PX")
      .arg(ttl.as_millis() as i64)
      .query_async(&mut *conn)
      .await;
    result
      .map(|v| v.is_some())
      .map_err(|e| TransientError::CacheUnavailable(e.to_string()))
  }

  async fn release_lease(&self, key: &str) -> Result<(), TransientError> {
    use redis::AsyncCommands;
    let mut conn = self.connection.lock().await;
    let _: () = conn
      .del(key)
      .await
      .map_err(|e| TransientError::CacheUnavailable(e.to_string()))?;
    Ok(())
  }
}

struct Entry {
  value: String,
  expires_at: Instant,
}

#[derive(Default)]
pub struct InMemoryCache {
  store: Arc<Mutex<HashMap<String, Entry>>>,
}

impl InMemoryCache {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl Cache for InMemoryCache {
  async fn get_raw(&self, key: &str) -> Result<Option<String>, TransientError> {
    let mut store = self.store.lock().await;
    if let Some(entry) = store.get(key) {
      if entry.expires_at > Instant::now() {
        return Ok(Some(entry.value.clone()));
      }
      store.remove(key);
    }
    Ok(None)
  }

  async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), TransientError> {
    let mut store = self.store.lock().await;
    store.insert(key.to_string(), Entry { value, expires_at: Instant::now() + ttl });
    Ok(())
  }

  async fn acquire_lease(&self, key: &str, ttl: Duration) -> Result<bool, TransientError> {
    let mut store = self.store.lock().await;
    let lease_key = format!("lease:{key}");
    if let Some(entry) = store.get(&lease_key) {
      if entry.expires_at > Instant::now() {
        return Ok(false);
      }
    }
    store.insert(lease_key, Entry { value: "locked".to_string(), expires_at: Instant::now() + ttl });
    Ok(true)
  }

  async fn release_lease(&self, key: &str) -> Result<(), TransientError> {
    let mut store = self.store.lock().await;
    store.remove(&format!("lease:{key}"));
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn in_memory_cache_round_trips_json_values() {
    let cache = InMemoryCache::new();
    set(&cache, "channel_details:UC1", &serde_json::json!({"title": "x"}), Duration::from_secs(60))
      .await
      .unwrap();
    let value: Option<serde_json::Value> = get(&cache, "channel_details:UC1").await.unwrap();
    assert_eq!(value.unwrap()["title"], "x");
  }

  #[tokio::test]
  async fn in_memory_cache_misses_for_unknown_key() {
    let cache = InMemoryCache::new();
    let value: Option<serde_json::Value> = get(&cache, "missing").await.unwrap();
    assert!(value.is_none());
  }

  #[tokio::test]
  async fn lease_excludes_concurrent_holder_until_released() {
    let cache = InMemoryCache::new();
    assert!(cache.acquire_lease("account:1", Duration::from_secs(30)).await.unwrap());
    assert!(!cache.acquire_lease("account:1", Duration::from_secs(30)).await.unwrap());
    cache.release_lease("account:1").await.unwrap();
    assert!(cache.acquire_lease("account:1", Duration::from_secs(30)).await.unwrap());
  }
}
