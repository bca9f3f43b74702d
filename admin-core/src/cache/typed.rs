//! Typed views over a [`ValueStore`]

use super::{CacheResult, ValueStore};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;

/// A hash key whose fields hold JSON encoded `T`
pub struct HashCache<T> {
    store: Arc<dyn ValueStore>,
    key: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for HashCache<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            key: self.key.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> HashCache<T> {
    pub fn new(store: Arc<dyn ValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            _marker: PhantomData,
        }
    }

    pub async fn get(&self, field: &str) -> CacheResult<Option<T>> {
        match self.store.hget(&self.key, field).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn get_many(&self, fields: &[String]) -> CacheResult<Vec<Option<T>>> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        self.store
            .hmget(&self.key, fields)
            .await?
            .into_iter()
            .map(|raw| -> CacheResult<Option<T>> {
                Ok(raw.map(|r| serde_json::from_str(&r)).transpose()?)
            })
            .collect()
    }

    pub async fn put(&self, field: &str, value: &T) -> CacheResult<()> {
        let raw = serde_json::to_string(value)?;
        self.store.hset(&self.key, field, raw).await
    }

    pub async fn remove(&self, fields: &[String]) -> CacheResult<u64> {
        if fields.is_empty() {
            return Ok(0);
        }
        self.store.hdel(&self.key, fields).await
    }

    pub async fn exists(&self, field: &str) -> CacheResult<bool> {
        self.store.hexists(&self.key, field).await
    }

    pub async fn fields(&self) -> CacheResult<Vec<String>> {
        self.store.hkeys(&self.key).await
    }

    /// Drop the whole hash
    pub async fn clear(&self) -> CacheResult<bool> {
        self.store.del(&self.key).await
    }
}

/// A plain key holding a JSON encoded `T`
pub struct ValueCache<T> {
    store: Arc<dyn ValueStore>,
    key: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ValueCache<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            key: self.key.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> ValueCache<T> {
    pub fn new(store: Arc<dyn ValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            _marker: PhantomData,
        }
    }

    pub async fn get(&self) -> CacheResult<Option<T>> {
        match self.store.get(&self.key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn put(&self, value: &T) -> CacheResult<()> {
        let raw = serde_json::to_string(value)?;
        self.store.set(&self.key, raw).await
    }

    pub async fn clear(&self) -> CacheResult<bool> {
        self.store.del(&self.key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryValueStore;

    #[tokio::test]
    async fn test_hash_cache_typed() {
        let store: Arc<dyn ValueStore> = Arc::new(MemoryValueStore::new());
        let cache: HashCache<Vec<i64>> = HashCache::new(store, "menus");
        cache.put("admin", &vec![1, 2, 3]).await.unwrap();

        assert_eq!(cache.get("admin").await.unwrap(), Some(vec![1, 2, 3]));
        let many = cache
            .get_many(&["admin".into(), "guest".into()])
            .await
            .unwrap();
        assert_eq!(many, vec![Some(vec![1, 2, 3]), None]);
        assert!(cache.clear().await.unwrap());
        assert_eq!(cache.get("admin").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_value_cache_typed() {
        let store: Arc<dyn ValueStore> = Arc::new(MemoryValueStore::new());
        let cache: ValueCache<Vec<String>> = ValueCache::new(store, "names");
        assert_eq!(cache.get().await.unwrap(), None);
        cache.put(&vec!["a".to_string()]).await.unwrap();
        assert_eq!(cache.get().await.unwrap(), Some(vec!["a".to_string()]));
    }
}
