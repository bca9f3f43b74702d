//! Value store (key / hash-field cache)
//!
//! The core talks to its cache only through [`ValueStore`]. Two addressing
//! modes are used:
//! - plain keys (`get` / `set` / `del`) for whole-value caches such as the
//!   department list
//! - hash fields (`hget` / `hset` / ...) for per-role and per-session entries
//!
//! Values are opaque strings; [`HashCache`] and [`ValueCache`] marshal typed
//! values through serde_json.

mod memory;
mod typed;

pub use memory::MemoryValueStore;
pub use typed::{HashCache, ValueCache};

use async_trait::async_trait;
use shared::error::AppError;
use thiserror::Error;

/// Cache error types
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Value store unavailable: {0}")]
    Unavailable(String),

    #[error("Key {0} holds a value of another type")]
    WrongType(String),

    #[error("Cache codec error: {0}")]
    Codec(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Codec(err.to_string())
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        AppError::cache(err.to_string())
    }
}

/// Result type for value store operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Key/field cache collaborator
#[async_trait]
pub trait ValueStore: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    async fn set(&self, key: &str, value: String) -> CacheResult<()>;

    /// Removes the key whatever it holds; returns whether it existed
    async fn del(&self, key: &str) -> CacheResult<bool>;

    async fn hget(&self, key: &str, field: &str) -> CacheResult<Option<String>>;

    /// One slot per requested field, `None` for missing fields
    async fn hmget(&self, key: &str, fields: &[String]) -> CacheResult<Vec<Option<String>>>;

    async fn hset(&self, key: &str, field: &str, value: String) -> CacheResult<()>;

    /// Returns the number of fields removed
    async fn hdel(&self, key: &str, fields: &[String]) -> CacheResult<u64>;

    async fn hexists(&self, key: &str, field: &str) -> CacheResult<bool>;

    async fn hkeys(&self, key: &str) -> CacheResult<Vec<String>>;

    async fn hgetall(&self, key: &str) -> CacheResult<Vec<(String, String)>>;
}
