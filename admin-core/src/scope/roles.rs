//! 角色配置目录
//!
//! 按角色编码缓存角色配置 (hash `sys-role-permission-cache`), 缓存为空时
//! 直接从存储整体加载 (不经过仓储钩子, 钩子本身依赖这里)。

use crate::cache::{HashCache, ValueStore};
use crate::db::models::Role;
use crate::db::repository::load_rows;
use crate::db::{RelationalStore, SelectQuery};
use shared::error::AppResult;
use std::sync::Arc;

pub const ROLE_CACHE_KEY: &str = "sys-role-permission-cache";

#[derive(Clone)]
pub struct RoleDirectory {
    store: Arc<dyn RelationalStore>,
    cache: HashCache<Role>,
}

impl RoleDirectory {
    pub fn new(store: Arc<dyn RelationalStore>, values: Arc<dyn ValueStore>) -> Self {
        Self {
            store,
            cache: HashCache::new(values, ROLE_CACHE_KEY),
        }
    }

    /// 角色配置, 未知编码被忽略
    pub async fn role_configs(&self, codes: &[String]) -> AppResult<Vec<Role>> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        if self.cache.fields().await?.is_empty() {
            self.reload().await?;
        }
        let found = self.cache.get_many(codes).await?;
        if found.iter().any(Option::is_none) {
            tracing::debug!(?codes, "some role codes are unknown");
        }
        Ok(found.into_iter().flatten().collect())
    }

    /// 从数据库重新加载全部角色
    pub async fn reload(&self) -> AppResult<usize> {
        let roles: Vec<Role> = load_rows(self.store.as_ref(), &SelectQuery::default()).await?;
        for role in &roles {
            self.cache.put(&role.code, role).await?;
        }
        tracing::info!(count = roles.len(), "role cache loaded");
        Ok(roles.len())
    }

    /// 角色变更后清空, 下次读取时重新加载
    pub async fn invalidate(&self) -> AppResult<()> {
        self.cache.clear().await?;
        Ok(())
    }
}
