//! Department Model

use super::AuditFields;
use super::serde_helpers;
use crate::db::repository::Entity;
use serde::{Deserialize, Serialize};

/// Department model (`sys_department`), tree via `pid`; roots have `pid = 0`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Department {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub pid: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "serde_helpers::flex_bool")]
    pub status: bool,
    #[serde(default)]
    pub order_num: i64,
    #[serde(flatten)]
    pub audit: AuditFields,
}

impl Department {
    pub fn new(id: i64, pid: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            pid,
            name: name.into(),
            status: true,
            ..Default::default()
        }
    }
}

impl Entity for Department {
    const TABLE: &'static str = "sys_department";

    fn clear_primary_key(&mut self) {
        self.id = 0;
    }
}

/// 部门树节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentNode {
    #[serde(flatten)]
    pub department: Department,
    #[serde(default)]
    pub children: Vec<DepartmentNode>,
}
