//! Menu Model

use super::AuditFields;
use crate::db::repository::Entity;
use serde::{Deserialize, Serialize};

/// 菜单类型
///
/// 只有接口菜单 (`Api`) 提供权限码, 其余类型提供菜单 ID。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum MenuType {
    Api = 0,
    #[default]
    Menu = 1,
    Catalogue = 2,
    Iframe = 3,
    Link = 4,
}

impl From<MenuType> for i64 {
    fn from(t: MenuType) -> Self {
        t as i64
    }
}

impl TryFrom<i64> for MenuType {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Api),
            1 => Ok(Self::Menu),
            2 => Ok(Self::Catalogue),
            3 => Ok(Self::Iframe),
            4 => Ok(Self::Link),
            other => Err(format!("invalid menu type: {other}")),
        }
    }
}

/// Menu model (`sys_menu`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Menu {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub pid: i64,
    #[serde(default)]
    pub menu_type: MenuType,
    /// 权限码, 如 `sys:user:add`
    #[serde(default)]
    pub api_code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub order_num: i64,
    #[serde(flatten)]
    pub audit: AuditFields,
}

impl Menu {
    /// 接口权限菜单
    pub fn api(id: i64, api_code: impl Into<String>) -> Self {
        Self {
            id,
            menu_type: MenuType::Api,
            api_code: api_code.into(),
            ..Default::default()
        }
    }

    /// 页面菜单
    pub fn page(id: i64, name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id,
            menu_type: MenuType::Menu,
            name: name.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn is_api(&self) -> bool {
        self.menu_type == MenuType::Api
    }
}

impl Entity for Menu {
    const TABLE: &'static str = "sys_menu";

    fn clear_primary_key(&mut self) {
        self.id = 0;
    }
}
