//! 仓储钩子
//!
//! 在每次仓储调用到达存储之前执行:
//! - 创建: 写入 `create_by` / `create_dept`
//! - 更新: 写入 `update_by`, 过滤器追加更新范围
//! - 查询: 过滤器追加查询范围
//! - 删除: 视为写操作, 追加更新范围
//!
//! 上下文带跳过标记或没有身份能力时, 钩子不做任何事。

use crate::auth::{CallContext, CurrentUser};
use crate::db::models::DataStrategy;
use crate::db::repository::EntityColumns;
use crate::db::{Filter, Record};
use crate::scope::{DepartmentHierarchy, RoleDirectory, RowScopePolicy};
use serde_json::Value;
use shared::error::AppResult;
use tracing::debug;

#[derive(Clone)]
pub struct HookEngine {
    roles: RoleDirectory,
    policy: RowScopePolicy,
}

#[derive(Clone, Copy)]
enum ScopeKind {
    Query,
    Update,
}

impl HookEngine {
    pub fn new(roles: RoleDirectory, departments: DepartmentHierarchy) -> Self {
        Self {
            roles,
            policy: RowScopePolicy::new(departments),
        }
    }

    async fn caller(&self, ctx: &CallContext) -> AppResult<Option<CurrentUser>> {
        if ctx.is_skipped() {
            return Ok(None);
        }
        ctx.current_user().await
    }

    async fn strategy(&self, user: &CurrentUser, kind: ScopeKind) -> AppResult<Option<DataStrategy>> {
        let roles = self.roles.role_configs(&user.role_codes).await?;
        Ok(match kind {
            ScopeKind::Query => RowScopePolicy::merge_query(&roles),
            ScopeKind::Update => RowScopePolicy::merge_update(&roles),
        })
    }

    async fn scoped(
        &self,
        ctx: &CallContext,
        columns: &EntityColumns,
        filter: Filter,
        kind: ScopeKind,
    ) -> AppResult<(Filter, Option<CurrentUser>)> {
        let Some(user) = self.caller(ctx).await? else {
            return Ok((filter, None));
        };
        let strategy = self.strategy(&user, kind).await?;
        let scope = self.policy.resolve(strategy, &user).await?;
        debug!(uid = user.uid, ?strategy, ?scope, "row scope applied");
        Ok((scope.apply(filter, columns), Some(user)))
    }

    pub async fn before_create(
        &self,
        ctx: &CallContext,
        columns: &EntityColumns,
        record: &mut Record,
    ) -> AppResult<()> {
        if let Some(user) = self.caller(ctx).await? {
            record.insert(columns.create_by.to_string(), Value::from(user.uid));
            record.insert(columns.create_dept.to_string(), Value::from(user.department_id));
        }
        Ok(())
    }

    pub async fn before_update(
        &self,
        ctx: &CallContext,
        columns: &EntityColumns,
        filter: Filter,
        assignments: &mut Record,
    ) -> AppResult<Filter> {
        let (filter, user) = self.scoped(ctx, columns, filter, ScopeKind::Update).await?;
        if let Some(user) = user {
            assignments.insert(columns.update_by.to_string(), Value::from(user.uid));
        }
        Ok(filter)
    }

    pub async fn before_query(
        &self,
        ctx: &CallContext,
        columns: &EntityColumns,
        filter: Filter,
    ) -> AppResult<Filter> {
        Ok(self.scoped(ctx, columns, filter, ScopeKind::Query).await?.0)
    }

    pub async fn before_delete(
        &self,
        ctx: &CallContext,
        columns: &EntityColumns,
        filter: Filter,
    ) -> AppResult<Filter> {
        Ok(self.scoped(ctx, columns, filter, ScopeKind::Update).await?.0)
    }
}
