//! Relational store abstraction
//!
//! [`RelationalStore`] is the only way the repository reaches persistence.
//! Soft delete is a store concern: when [`TableMeta::soft_delete`] names a
//! column, `delete` stamps it instead of removing rows and every scoped
//! read/write ignores stamped rows. `unscoped = true` sees (and hard
//! deletes) everything.

mod memory;
mod sqlite;

pub use memory::{MemoryStore, StoreStats};
pub use sqlite::SqliteStore;

use super::filter::{Filter, OrderBy, Record};
use async_trait::async_trait;
use shared::error::AppError;
use thiserror::Error;

/// Store error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Unsupported value for column {0}")]
    UnsupportedValue(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::database(err.to_string())
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Physical table description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMeta {
    pub table: String,
    pub primary_key: String,
    /// Soft-delete marker column; NULL means live
    pub soft_delete: Option<String>,
}

impl TableMeta {
    pub fn new(table: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: primary_key.into(),
            soft_delete: None,
        }
    }

    pub fn with_soft_delete(mut self, column: impl Into<String>) -> Self {
        self.soft_delete = Some(column.into());
        self
    }

    /// Extra condition hiding soft-deleted rows
    pub fn live_filter(&self, unscoped: bool) -> Filter {
        match (&self.soft_delete, unscoped) {
            (Some(col), false) => Filter::is_null(col.clone()),
            _ => Filter::All,
        }
    }
}

/// SELECT description
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectQuery {
    pub filter: Filter,
    pub order: Vec<OrderBy>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub unscoped: bool,
}

impl SelectQuery {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn order(mut self, order: Vec<OrderBy>) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn unscoped(mut self, unscoped: bool) -> Self {
        self.unscoped = unscoped;
        self
    }
}

/// SQL persistence collaborator
#[async_trait]
pub trait RelationalStore: Send + Sync {
    async fn select(&self, meta: &TableMeta, query: &SelectQuery) -> StoreResult<Vec<Record>>;

    async fn count(&self, meta: &TableMeta, filter: &Filter, unscoped: bool) -> StoreResult<i64>;

    /// Inserts rows and returns them as stored (generated keys filled in)
    async fn insert(&self, meta: &TableMeta, rows: Vec<Record>) -> StoreResult<Vec<Record>>;

    /// Applies `assignments` to every matching row; returns affected rows
    async fn update(
        &self,
        meta: &TableMeta,
        filter: &Filter,
        assignments: &Record,
        unscoped: bool,
    ) -> StoreResult<u64>;

    /// Soft deletes when the table has a marker column (unless unscoped)
    async fn delete(&self, meta: &TableMeta, filter: &Filter, unscoped: bool) -> StoreResult<u64>;
}
