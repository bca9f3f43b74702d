//! 角色权限缓存
//!
//! 由角色与菜单关系派生三张 hash, 以角色编码为字段:
//! - `role-code-cache-key` - 接口权限码
//! - `role-menu-cache-key` - 菜单 ID
//! - `role-home-path-cache-key` - 首页路径
//!
//! ## 设计原则
//! - 缓存缺失、角色未知或缓存不可用时一律视为无权限
//! - [`PermissionCache::refresh`] 先删后建, 重建期间读者可能看到部分数据

use crate::auth::identity::CurrentUser;
use crate::cache::{HashCache, ValueStore};
use crate::db::models::{Menu, Role};
use crate::db::repository::load_rows;
use crate::db::{RelationalStore, SelectQuery};
use shared::error::{AppError, AppResult};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub const ROLE_CODE_CACHE_KEY: &str = "role-code-cache-key";
pub const ROLE_MENU_CACHE_KEY: &str = "role-menu-cache-key";
pub const ROLE_HOME_PATH_CACHE_KEY: &str = "role-home-path-cache-key";

/// 单个角色的派生权限
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolePermissions {
    pub codes: Vec<String>,
    pub menu_ids: Vec<i64>,
    pub home_path: String,
}

/// 按角色编码构建权限表
///
/// 只有出现在角色 `menu_id_list` 中的菜单参与计算;
/// 接口菜单贡献权限码, 其余菜单贡献菜单 ID。
pub fn build_role_map(roles: &[Role], menus: &[Menu]) -> HashMap<String, RolePermissions> {
    let by_id: HashMap<i64, &Menu> = menus.iter().map(|m| (m.id, m)).collect();

    roles
        .iter()
        .map(|role| {
            let mut perms = RolePermissions {
                home_path: role.home_path.clone(),
                ..Default::default()
            };
            for menu in role.menu_id_list.iter().filter_map(|id| by_id.get(id)) {
                if menu.is_api() {
                    if !menu.api_code.is_empty() {
                        perms.codes.push(menu.api_code.clone());
                    }
                } else {
                    perms.menu_ids.push(menu.id);
                }
            }
            (role.code.clone(), perms)
        })
        .collect()
}

#[derive(Clone)]
pub struct PermissionCache {
    store: Arc<dyn RelationalStore>,
    codes: HashCache<Vec<String>>,
    menu_ids: HashCache<Vec<i64>>,
    home_paths: HashCache<String>,
}

impl PermissionCache {
    pub fn new(store: Arc<dyn RelationalStore>, values: Arc<dyn ValueStore>) -> Self {
        Self {
            store,
            codes: HashCache::new(values.clone(), ROLE_CODE_CACHE_KEY),
            menu_ids: HashCache::new(values.clone(), ROLE_MENU_CACHE_KEY),
            home_paths: HashCache::new(values, ROLE_HOME_PATH_CACHE_KEY),
        }
    }

    /// 从数据库整体重建三张 hash
    pub async fn refresh(&self) -> AppResult<usize> {
        let all = SelectQuery::default();
        let roles: Vec<Role> = load_rows(self.store.as_ref(), &all).await?;
        let menus: Vec<Menu> = load_rows(self.store.as_ref(), &all).await?;
        let map = build_role_map(&roles, &menus);

        self.codes.clear().await?;
        self.menu_ids.clear().await?;
        self.home_paths.clear().await?;

        for (code, perms) in &map {
            self.codes.put(code, &perms.codes).await?;
            self.menu_ids.put(code, &perms.menu_ids).await?;
            self.home_paths.put(code, &perms.home_path).await?;
        }

        tracing::info!(roles = map.len(), menus = menus.len(), "permission cache rebuilt");
        Ok(map.len())
    }

    /// 角色集合是否拥有权限码
    ///
    /// `require_all` 为真时要求全部具备, 否则任一即可。
    pub async fn check_role_have_code_permission(
        &self,
        roles: &[String],
        codes: &[&str],
        require_all: bool,
    ) -> bool {
        if roles.is_empty() {
            return false;
        }
        if codes.is_empty() {
            return true;
        }

        let cached = match self.codes.get_many(roles).await {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(error = %e, ?roles, "permission lookup failed, denying");
                return false;
            }
        };
        let granted: HashSet<String> = cached.into_iter().flatten().flatten().collect();
        if granted.is_empty() {
            tracing::debug!(?roles, "no permission codes cached for roles");
            return false;
        }

        if require_all {
            codes.iter().all(|c| granted.contains(*c))
        } else {
            codes.iter().any(|c| granted.contains(*c))
        }
    }

    /// 角色集合可见的菜单 ID, 去重并保持首次出现的顺序
    pub async fn role_menu_ids(&self, roles: &[String]) -> Vec<i64> {
        if roles.is_empty() {
            return Vec::new();
        }
        let cached = match self.menu_ids.get_many(roles).await {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(error = %e, ?roles, "menu lookup failed");
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        cached
            .into_iter()
            .flatten()
            .flatten()
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// 角色首页路径, 未知时为空串
    pub async fn role_home_path(&self, role: &str) -> String {
        match self.home_paths.get(role).await {
            Ok(path) => path.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, role, "home path lookup failed");
                String::new()
            }
        }
    }

    pub async fn require_permission(&self, user: &CurrentUser, code: &str) -> AppResult<()> {
        self.require(user, &[code], true).await
    }

    pub async fn require_any_permission(&self, user: &CurrentUser, codes: &[&str]) -> AppResult<()> {
        self.require(user, codes, false).await
    }

    pub async fn require_all_permissions(&self, user: &CurrentUser, codes: &[&str]) -> AppResult<()> {
        self.require(user, codes, true).await
    }

    async fn require(&self, user: &CurrentUser, codes: &[&str], require_all: bool) -> AppResult<()> {
        if self
            .check_role_have_code_permission(&user.role_codes, codes, require_all)
            .await
        {
            return Ok(());
        }
        tracing::debug!(uid = user.uid, ?codes, require_all, "permission denied");
        Err(
            AppError::permission_denied(format!("Permission denied: {}", codes.join(", ")))
                .with_detail("required", codes.join(",")),
        )
    }
}
