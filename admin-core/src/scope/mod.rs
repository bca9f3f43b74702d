//! 行级数据权限
//!
//! 调用方的多个角色按 "取最大值" 合并出查询策略和更新策略, 再结合部门树
//! 得到 [`DataScope`], 最终作为额外条件追加到查询/更新的过滤器上。
//!
//! | 策略 | 附加条件 |
//! |------|----------|
//! | PersonalOnly | `create_by = uid` |
//! | DepartmentAndBelow | `create_dept IN closure OR create_by = uid` |
//! | AllData / 无策略 | 无 |

mod department;
mod roles;

pub use department::{DepartmentHierarchy, build_tree, collect_children};
pub use roles::RoleDirectory;

use crate::auth::CurrentUser;
use crate::db::Filter;
use crate::db::models::{DataStrategy, Role};
use crate::db::repository::EntityColumns;
use shared::error::AppResult;

/// Effective row restriction for one caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataScope {
    All,
    Personal { uid: i64 },
    Department { uid: i64, departments: Vec<i64> },
}

impl DataScope {
    /// `filter AND restriction`
    pub fn apply(&self, filter: Filter, columns: &EntityColumns) -> Filter {
        match self {
            DataScope::All => filter,
            DataScope::Personal { uid } => filter.and(Filter::eq(columns.create_by, *uid)),
            DataScope::Department { uid, departments } => filter.and(
                Filter::is_in(columns.create_dept, departments.iter().copied())
                    .or(Filter::eq(columns.create_by, *uid)),
            ),
        }
    }
}

/// Computes the caller's [`DataScope`]
#[derive(Clone)]
pub struct RowScopePolicy {
    departments: DepartmentHierarchy,
}

impl RowScopePolicy {
    pub fn new(departments: DepartmentHierarchy) -> Self {
        Self { departments }
    }

    /// Max of the roles' query strategies
    pub fn merge_query(roles: &[Role]) -> Option<DataStrategy> {
        roles.iter().filter_map(|r| r.query_strategy).max()
    }

    /// Max of the roles' update strategies
    pub fn merge_update(roles: &[Role]) -> Option<DataStrategy> {
        roles.iter().filter_map(|r| r.update_strategy).max()
    }

    pub async fn resolve(
        &self,
        strategy: Option<DataStrategy>,
        user: &CurrentUser,
    ) -> AppResult<DataScope> {
        Ok(match strategy {
            Some(DataStrategy::PersonalOnly) => DataScope::Personal { uid: user.uid },
            Some(DataStrategy::DepartmentAndBelow) => DataScope::Department {
                uid: user.uid,
                departments: self.departments.children(user.department_id).await?,
            },
            Some(DataStrategy::AllData) | None => DataScope::All,
        })
    }
}
