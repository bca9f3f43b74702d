//! Shared types for the admin core
//!
//! Common types used across the workspace: the unified error system and the
//! paging/sorting parameters accepted by the generic repository.

pub mod error;
pub mod types;

// Re-exports
pub use error::{AppError, AppResult, ErrorCategory, ErrorCode};
pub use serde::{Deserialize, Serialize};
pub use types::{OrderParam, PageParam, PageResult, SortType};
