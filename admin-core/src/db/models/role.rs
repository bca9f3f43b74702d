//! Role Model

use super::AuditFields;
use super::serde_helpers;
use crate::db::repository::Entity;
use serde::{Deserialize, Serialize};

/// 数据权限策略, 数值越大范围越宽
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum DataStrategy {
    /// 仅本人数据
    PersonalOnly = 1,
    /// 本部门及以下
    DepartmentAndBelow = 2,
    /// 全部数据
    AllData = 3,
}

impl From<DataStrategy> for i64 {
    fn from(s: DataStrategy) -> Self {
        s as i64
    }
}

impl TryFrom<i64> for DataStrategy {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::PersonalOnly),
            2 => Ok(Self::DepartmentAndBelow),
            3 => Ok(Self::AllData),
            other => Err(format!("invalid data strategy: {other}")),
        }
    }
}

/// Role model (`sys_role`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Role {
    #[serde(default)]
    pub id: i64,
    /// 角色编码, 用户令牌中携带的就是它
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub query_strategy: Option<DataStrategy>,
    #[serde(default)]
    pub update_strategy: Option<DataStrategy>,
    /// 授权的菜单 ID (接口菜单提供权限码)
    #[serde(default, deserialize_with = "serde_helpers::flex_vec")]
    pub menu_id_list: Vec<i64>,
    /// 登录后的首页
    #[serde(default)]
    pub home_path: String,
    #[serde(default, deserialize_with = "serde_helpers::flex_bool")]
    pub enable_status: bool,
    #[serde(flatten)]
    pub audit: AuditFields,
}

impl Role {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            enable_status: true,
            ..Default::default()
        }
    }

    pub fn with_strategies(mut self, query: DataStrategy, update: DataStrategy) -> Self {
        self.query_strategy = Some(query);
        self.update_strategy = Some(update);
        self
    }

    pub fn with_menus(mut self, menu_ids: Vec<i64>) -> Self {
        self.menu_id_list = menu_ids;
        self
    }

    pub fn with_home_path(mut self, path: impl Into<String>) -> Self {
        self.home_path = path.into();
        self
    }
}

impl Entity for Role {
    const TABLE: &'static str = "sys_role";

    fn clear_primary_key(&mut self) {
        self.id = 0;
    }
}

/// Role as exposed to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleView {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub description: String,
    pub query_strategy: Option<DataStrategy>,
    pub update_strategy: Option<DataStrategy>,
    pub menu_id_list: Vec<i64>,
    pub home_path: String,
    pub enable_status: bool,
    pub update_time: i64,
}

impl From<Role> for RoleView {
    fn from(role: Role) -> Self {
        Self {
            id: role.id,
            code: role.code,
            name: role.name,
            description: role.description,
            query_strategy: role.query_strategy,
            update_strategy: role.update_strategy,
            menu_id_list: role.menu_id_list,
            home_path: role.home_path,
            enable_status: role.enable_status,
            update_time: role.audit.update_time,
        }
    }
}
