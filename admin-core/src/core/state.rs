use std::sync::Arc;

use crate::auth::{CallContext, PermissionCache, SessionTokenManager};
use crate::cache::{MemoryValueStore, ValueStore};
use crate::core::Config;
use crate::db::repository::{Entity, Repository};
use crate::db::{DbService, RelationalStore};
use crate::hooks::HookEngine;
use crate::scope::{DepartmentHierarchy, RoleDirectory};
use crate::utils::{Clock, SystemClock};
use shared::error::AppResult;

/// 核心状态 - 持有所有组件的共享引用
///
/// 所有字段都是 `Arc` 或内部持有 `Arc` 的句柄, 克隆成本极低。
///
/// # 组件
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | store | Arc<dyn RelationalStore> | 关系存储 |
/// | values | Arc<dyn ValueStore> | 键值缓存 |
/// | tokens | SessionTokenManager | 会话令牌 |
/// | permissions | PermissionCache | 角色权限缓存 |
/// | roles | RoleDirectory | 角色配置缓存 (数据权限) |
/// | departments | DepartmentHierarchy | 部门树 |
/// | hooks | Arc<HookEngine> | 仓储钩子 |
///
/// # 使用示例
///
/// ```ignore
/// let state = ServerState::initialize(&Config::load()?).await?;
/// let ctx = CallContext::with_resolver(Arc::new(BearerIdentity::new(token, state.tokens.clone())));
/// let roles = state.repository::<Role, RoleView>().with_context(ctx);
/// ```
#[derive(Clone)]
pub struct ServerState {
    /// 配置
    pub config: Config,
    pub store: Arc<dyn RelationalStore>,
    pub values: Arc<dyn ValueStore>,
    pub tokens: SessionTokenManager,
    pub permissions: PermissionCache,
    pub roles: RoleDirectory,
    pub departments: DepartmentHierarchy,
    pub hooks: Arc<HookEngine>,
}

impl ServerState {
    /// 初始化核心状态
    ///
    /// 按顺序初始化：
    /// 1. 数据库 (SQLite, 执行迁移)
    /// 2. 键值缓存 (进程内)
    /// 3. 各组件, 并预热权限缓存
    pub async fn initialize(config: &Config) -> AppResult<Self> {
        let db = DbService::new(&config.database_url, config.db_max_connections).await?;
        let store: Arc<dyn RelationalStore> = Arc::new(db.store());
        let values: Arc<dyn ValueStore> = Arc::new(MemoryValueStore::new());

        Self::with_stores(config.clone(), store, values).await
    }

    /// 使用指定的存储构造 (测试或外部缓存)
    pub async fn with_stores(
        config: Config,
        store: Arc<dyn RelationalStore>,
        values: Arc<dyn ValueStore>,
    ) -> AppResult<Self> {
        Self::with_clock(config, store, values, Arc::new(SystemClock)).await
    }

    pub async fn with_clock(
        config: Config,
        store: Arc<dyn RelationalStore>,
        values: Arc<dyn ValueStore>,
        clock: Arc<dyn Clock>,
    ) -> AppResult<Self> {
        let tokens = SessionTokenManager::with_clock(config.jwt.clone(), values.clone(), clock);
        let permissions = PermissionCache::new(store.clone(), values.clone());
        let roles = RoleDirectory::new(store.clone(), values.clone());
        let departments = DepartmentHierarchy::new(store.clone(), values.clone());
        let hooks = Arc::new(HookEngine::new(roles.clone(), departments.clone()));

        let state = Self {
            config,
            store,
            values,
            tokens,
            permissions,
            roles,
            departments,
            hooks,
        };

        state.permissions.refresh().await?;
        tracing::info!(environment = %state.config.environment, "admin core initialized");
        Ok(state)
    }

    /// 带钩子的仓储 (后台上下文, 使用前绑定调用方)
    pub fn repository<M, V>(&self) -> Repository<M, V>
    where
        M: Entity,
        V: From<M>,
    {
        Repository::new(self.store.clone(), Some(self.hooks.clone()))
    }

    /// 绑定调用方的仓储
    pub fn repository_for<M, V>(&self, ctx: CallContext) -> Repository<M, V>
    where
        M: Entity,
        V: From<M>,
    {
        self.repository().with_context(ctx)
    }

    /// 角色或菜单变更后调用
    pub async fn on_roles_changed(&self) -> AppResult<()> {
        self.roles.invalidate().await?;
        self.permissions.refresh().await?;
        Ok(())
    }

    /// 部门变更后调用
    pub async fn on_departments_changed(&self) -> AppResult<()> {
        self.departments.invalidate().await
    }
}
