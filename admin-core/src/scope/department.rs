//! 部门树
//!
//! 部门列表整体缓存在 ValueStore 的 `sys-department-cache` 键下,
//! 部门变更后调用 [`DepartmentHierarchy::invalidate`]。

use crate::cache::{ValueCache, ValueStore};
use crate::db::models::{Department, DepartmentNode};
use crate::db::repository::load_rows;
use crate::db::{Filter, OrderBy, RelationalStore, SelectQuery};
use shared::error::AppResult;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub const DEPARTMENT_CACHE_KEY: &str = "sys-department-cache";

/// 收集 `id` 的全部下级部门, 最后追加 `id` 自身
///
/// 存在环时每个部门只访问一次。
pub fn collect_children(departments: &[Department], id: i64) -> Vec<i64> {
    let mut adjacency: HashMap<i64, Vec<i64>> = HashMap::new();
    for d in departments {
        adjacency.entry(d.pid).or_default().push(d.id);
    }

    let mut out = Vec::new();
    let mut seen = HashSet::from([id]);
    let mut stack = vec![id];
    while let Some(current) = stack.pop() {
        if let Some(children) = adjacency.get(&current) {
            for &child in children.iter().rev() {
                if seen.insert(child) {
                    out.push(child);
                    stack.push(child);
                }
            }
        }
    }
    out.push(id);
    out
}

/// 组装部门树: 根节点 `pid = 0`, 找不到父节点的部门被丢弃
pub fn build_tree(departments: &[Department]) -> Vec<DepartmentNode> {
    let mut by_parent: HashMap<i64, Vec<&Department>> = HashMap::new();
    for d in departments {
        by_parent.entry(d.pid).or_default().push(d);
    }
    for siblings in by_parent.values_mut() {
        siblings.sort_by_key(|d| (d.order_num, d.id));
    }

    fn attach(
        parent: i64,
        by_parent: &HashMap<i64, Vec<&Department>>,
        seen: &mut HashSet<i64>,
    ) -> Vec<DepartmentNode> {
        let Some(children) = by_parent.get(&parent) else {
            return Vec::new();
        };
        children
            .iter()
            .filter(|d| seen.insert(d.id))
            .copied()
            .collect::<Vec<_>>()
            .into_iter()
            .map(|d| DepartmentNode {
                department: d.clone(),
                children: attach(d.id, by_parent, seen),
            })
            .collect()
    }

    let mut seen = HashSet::new();
    attach(0, &by_parent, &mut seen)
}

#[derive(Clone)]
pub struct DepartmentHierarchy {
    store: Arc<dyn RelationalStore>,
    cache: ValueCache<Vec<Department>>,
}

impl DepartmentHierarchy {
    pub fn new(store: Arc<dyn RelationalStore>, values: Arc<dyn ValueStore>) -> Self {
        Self {
            store,
            cache: ValueCache::new(values, DEPARTMENT_CACHE_KEY),
        }
    }

    /// 全部部门, 优先读缓存
    pub async fn list(&self) -> AppResult<Vec<Department>> {
        match self.cache.get().await {
            Ok(Some(departments)) => return Ok(departments),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "department cache read failed, loading from store"),
        }

        let query = SelectQuery::new(Filter::All).order(vec![OrderBy::asc("order_num")]);
        let departments: Vec<Department> = load_rows(self.store.as_ref(), &query).await?;
        if let Err(e) = self.cache.put(&departments).await {
            tracing::warn!(error = %e, "department cache write failed");
        } else {
            tracing::info!(count = departments.len(), "department cache rebuilt");
        }
        Ok(departments)
    }

    /// `id` 及其全部下级
    pub async fn children(&self, id: i64) -> AppResult<Vec<i64>> {
        Ok(collect_children(&self.list().await?, id))
    }

    pub async fn tree(&self) -> AppResult<Vec<DepartmentNode>> {
        Ok(build_tree(&self.list().await?))
    }

    pub async fn invalidate(&self) -> AppResult<()> {
        self.cache.clear().await?;
        tracing::debug!("department cache invalidated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Department> {
        vec![
            Department::new(1, 0, "HQ"),
            Department::new(2, 0, "Branch"),
            Department::new(3, 1, "Sales"),
            Department::new(9, 3, "Sales East"),
            Department::new(12, 40, "Orphan"),
        ]
    }

    #[test]
    fn test_collect_children_includes_self_last() {
        let depts = sample();
        let mut closure = collect_children(&depts, 1);
        assert_eq!(closure.last(), Some(&1));
        closure.sort();
        assert_eq!(closure, vec![1, 3, 9]);
        assert_eq!(collect_children(&depts, 9), vec![9]);
        assert_eq!(collect_children(&depts, 77), vec![77]);
    }

    #[test]
    fn test_collect_children_survives_cycles() {
        let depts = vec![Department::new(1, 2, "a"), Department::new(2, 1, "b")];
        let mut closure = collect_children(&depts, 1);
        closure.sort();
        assert_eq!(closure, vec![1, 2]);
    }

    #[test]
    fn test_build_tree_drops_orphans() {
        let tree = build_tree(&sample());
        let roots: Vec<_> = tree.iter().map(|n| n.department.id).collect();
        assert_eq!(roots, vec![1, 2]);
        assert_eq!(tree[0].children[0].department.id, 3);
        assert_eq!(tree[0].children[0].children[0].department.id, 9);
        let all_ids: Vec<i64> = flatten(&tree);
        assert!(!all_ids.contains(&12));
    }

    fn flatten(nodes: &[DepartmentNode]) -> Vec<i64> {
        nodes
            .iter()
            .flat_map(|n| {
                let mut ids = vec![n.department.id];
                ids.extend(flatten(&n.children));
                ids
            })
            .collect()
    }
}
