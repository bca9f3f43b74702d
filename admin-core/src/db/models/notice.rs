//! Notice Model

use super::AuditFields;
use super::serde_helpers;
use crate::db::repository::Entity;
use serde::{Deserialize, Serialize};

/// 通知公告 (`sys_notice`), 受行级数据权限约束的业务表
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, deserialize_with = "serde_helpers::flex_bool")]
    pub pinned: bool,
    #[serde(flatten)]
    pub audit: AuditFields,
}

impl Notice {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

impl Entity for Notice {
    const TABLE: &'static str = "sys_notice";

    fn clear_primary_key(&mut self) {
        self.id = 0;
    }
}

/// 列表视图
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeView {
    pub id: i64,
    pub title: String,
    pub pinned: bool,
    pub create_by: i64,
}

impl From<Notice> for NoticeView {
    fn from(n: Notice) -> Self {
        Self {
            id: n.id,
            title: n.title,
            pinned: n.pinned,
            create_by: n.audit.create_by,
        }
    }
}
