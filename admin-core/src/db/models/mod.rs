//! Database Models
//!
//! Field names are column names: entities serialize in snake_case and
//! travel to the store as [`Record`](crate::db::Record)s.

// Serde helpers
pub mod serde_helpers;

// System
pub mod department;
pub mod menu;
pub mod role;

// Business
pub mod notice;

// Re-exports
pub use department::{Department, DepartmentNode};
pub use menu::{Menu, MenuType};
pub use notice::{Notice, NoticeView};
pub use role::{DataStrategy, Role, RoleView};

use serde::{Deserialize, Serialize};

/// 审计字段, 展开 (flatten) 到每个实体中
///
/// 时间为 Unix millis; `delete_time` 为空表示未删除。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFields {
    #[serde(default)]
    pub create_by: i64,
    #[serde(default)]
    pub create_dept: i64,
    #[serde(default)]
    pub create_time: i64,
    #[serde(default)]
    pub update_by: i64,
    #[serde(default)]
    pub update_time: i64,
    #[serde(default)]
    pub delete_time: Option<i64>,
}
