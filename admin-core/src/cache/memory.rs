//! In-process value store

use super::{CacheError, CacheResult, ValueStore};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone)]
enum Slot {
    Value(String),
    Hash(HashMap<String, String>),
}

/// DashMap backed [`ValueStore`]
///
/// Keys share one namespace, like Redis: a key holds either a plain value
/// or a hash. `set_available(false)` makes every call fail, which is how
/// tests exercise the degraded paths.
#[derive(Debug, Default)]
pub struct MemoryValueStore {
    slots: DashMap<String, Slot>,
    offline: AtomicBool,
}

impl MemoryValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage (`false`) or recovery (`true`)
    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    fn check(&self) -> CacheResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("memory store offline".into()));
        }
        Ok(())
    }

    fn with_hash<T>(
        &self,
        key: &str,
        f: impl FnOnce(&HashMap<String, String>) -> T,
    ) -> CacheResult<Option<T>> {
        self.check()?;
        match self.slots.get(key) {
            None => Ok(None),
            Some(slot) => match slot.value() {
                Slot::Hash(h) => Ok(Some(f(h))),
                Slot::Value(_) => Err(CacheError::WrongType(key.to_string())),
            },
        }
    }
}

#[async_trait]
impl ValueStore for MemoryValueStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.check()?;
        match self.slots.get(key) {
            None => Ok(None),
            Some(slot) => match slot.value() {
                Slot::Value(v) => Ok(Some(v.clone())),
                Slot::Hash(_) => Err(CacheError::WrongType(key.to_string())),
            },
        }
    }

    async fn set(&self, key: &str, value: String) -> CacheResult<()> {
        self.check()?;
        self.slots.insert(key.to_string(), Slot::Value(value));
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<bool> {
        self.check()?;
        Ok(self.slots.remove(key).is_some())
    }

    async fn hget(&self, key: &str, field: &str) -> CacheResult<Option<String>> {
        Ok(self.with_hash(key, |h| h.get(field).cloned())?.flatten())
    }

    async fn hmget(&self, key: &str, fields: &[String]) -> CacheResult<Vec<Option<String>>> {
        let found = self.with_hash(key, |h| {
            fields.iter().map(|f| h.get(f).cloned()).collect::<Vec<_>>()
        })?;
        Ok(found.unwrap_or_else(|| vec![None; fields.len()]))
    }

    async fn hset(&self, key: &str, field: &str, value: String) -> CacheResult<()> {
        self.check()?;
        match self.slots.entry(key.to_string()) {
            MapEntry::Occupied(mut entry) => match entry.get_mut() {
                Slot::Hash(h) => {
                    h.insert(field.to_string(), value);
                    Ok(())
                }
                Slot::Value(_) => Err(CacheError::WrongType(key.to_string())),
            },
            MapEntry::Vacant(entry) => {
                entry.insert(Slot::Hash(HashMap::from([(field.to_string(), value)])));
                Ok(())
            }
        }
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> CacheResult<u64> {
        self.check()?;
        let mut removed = 0;
        let mut now_empty = false;
        if let Some(mut slot) = self.slots.get_mut(key) {
            match slot.value_mut() {
                Slot::Hash(h) => {
                    for field in fields {
                        if h.remove(field).is_some() {
                            removed += 1;
                        }
                    }
                    now_empty = h.is_empty();
                }
                Slot::Value(_) => return Err(CacheError::WrongType(key.to_string())),
            }
        }
        // 与 Redis 一致: 最后一个字段删除后 key 消失
        if now_empty {
            self.slots
                .remove_if(key, |_, slot| matches!(slot, Slot::Hash(h) if h.is_empty()));
        }
        Ok(removed)
    }

    async fn hexists(&self, key: &str, field: &str) -> CacheResult<bool> {
        Ok(self
            .with_hash(key, |h| h.contains_key(field))?
            .unwrap_or(false))
    }

    async fn hkeys(&self, key: &str) -> CacheResult<Vec<String>> {
        Ok(self
            .with_hash(key, |h| h.keys().cloned().collect())?
            .unwrap_or_default())
    }

    async fn hgetall(&self, key: &str) -> CacheResult<Vec<(String, String)>> {
        Ok(self
            .with_hash(key, |h| {
                h.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
            })?
            .unwrap_or_default())
    }
}
