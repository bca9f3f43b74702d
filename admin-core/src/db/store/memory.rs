//! In-process relational store
//!
//! Tables are created on first insert. Rows are kept ordered by primary key,
//! which is also the default result order.

use super::{RelationalStore, SelectQuery, StoreError, StoreResult, TableMeta};
use crate::db::filter::{Filter, Record, compare};
use crate::utils::now_millis;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use shared::SortType;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

#[derive(Debug, Default)]
struct MemTable {
    rows: BTreeMap<i64, Record>,
    next_id: i64,
}

/// Call counters, used by tests to observe query plans
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub selects: u64,
    pub counts: u64,
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, MemTable>>,
    selects: AtomicU64,
    counts: AtomicU64,
    inserts: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            selects: self.selects.load(AtomicOrdering::Relaxed),
            counts: self.counts.load(AtomicOrdering::Relaxed),
            inserts: self.inserts.load(AtomicOrdering::Relaxed),
            updates: self.updates.load(AtomicOrdering::Relaxed),
            deletes: self.deletes.load(AtomicOrdering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        for counter in [
            &self.selects,
            &self.counts,
            &self.inserts,
            &self.updates,
            &self.deletes,
        ] {
            counter.store(0, AtomicOrdering::Relaxed);
        }
    }

    /// Raw rows of a table including soft-deleted ones
    pub fn dump(&self, table: &str) -> Vec<Record> {
        self.tables
            .read()
            .get(table)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    fn visible(meta: &TableMeta, filter: &Filter, unscoped: bool) -> Filter {
        meta.live_filter(unscoped).and(filter.clone())
    }
}

fn key_of(meta: &TableMeta, row: &Record) -> StoreResult<Option<i64>> {
    match row.get(&meta.primary_key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(0) => Ok(None),
            Some(id) => Ok(Some(id)),
            None => Err(StoreError::UnsupportedValue(meta.primary_key.clone())),
        },
        Some(_) => Err(StoreError::UnsupportedValue(meta.primary_key.clone())),
    }
}

fn sort_rows(rows: &mut [Record], order: &[crate::db::filter::OrderBy]) {
    if order.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for term in order {
            let left = a.get(&term.column).unwrap_or(&Value::Null);
            let right = b.get(&term.column).unwrap_or(&Value::Null);
            // NULL 排在最前 (与 SQLite 一致)
            let ord = match (left.is_null(), right.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => compare(left, right).unwrap_or(Ordering::Equal),
            };
            let ord = match term.sort {
                SortType::Asc => ord,
                SortType::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

#[async_trait]
impl RelationalStore for MemoryStore {
    async fn select(&self, meta: &TableMeta, query: &SelectQuery) -> StoreResult<Vec<Record>> {
        self.selects.fetch_add(1, AtomicOrdering::Relaxed);
        let filter = Self::visible(meta, &query.filter, query.unscoped);
        let mut rows: Vec<Record> = {
            let tables = self.tables.read();
            match tables.get(&meta.table) {
                Some(t) => t
                    .rows
                    .values()
                    .filter(|r| filter.matches(r))
                    .cloned()
                    .collect(),
                None => Vec::new(),
            }
        };
        sort_rows(&mut rows, &query.order);

        let offset = query.offset.unwrap_or(0).max(0) as usize;
        let rows = rows.into_iter().skip(offset);
        Ok(match query.limit {
            Some(limit) if limit >= 0 => rows.take(limit as usize).collect(),
            _ => rows.collect(),
        })
    }

    async fn count(&self, meta: &TableMeta, filter: &Filter, unscoped: bool) -> StoreResult<i64> {
        self.counts.fetch_add(1, AtomicOrdering::Relaxed);
        let filter = Self::visible(meta, filter, unscoped);
        let tables = self.tables.read();
        Ok(tables
            .get(&meta.table)
            .map(|t| t.rows.values().filter(|r| filter.matches(r)).count() as i64)
            .unwrap_or(0))
    }

    async fn insert(&self, meta: &TableMeta, rows: Vec<Record>) -> StoreResult<Vec<Record>> {
        self.inserts.fetch_add(1, AtomicOrdering::Relaxed);
        let mut tables = self.tables.write();
        let table = tables.entry(meta.table.clone()).or_default();

        // 先校验整批主键，保证失败时不写入任何行
        let mut planned = Vec::with_capacity(rows.len());
        let mut next_id = table.next_id;
        for mut row in rows {
            let id = match key_of(meta, &row)? {
                Some(id) => {
                    if table.rows.contains_key(&id) || planned.iter().any(|(p, _)| *p == id) {
                        return Err(StoreError::Constraint(format!(
                            "duplicate primary key {id} in {}",
                            meta.table
                        )));
                    }
                    next_id = next_id.max(id);
                    id
                }
                None => {
                    next_id += 1;
                    next_id
                }
            };
            row.insert(meta.primary_key.clone(), Value::from(id));
            if let Some(col) = &meta.soft_delete {
                row.entry(col.clone()).or_insert(Value::Null);
            }
            planned.push((id, row));
        }

        table.next_id = next_id;
        let mut stored = Vec::with_capacity(planned.len());
        for (id, row) in planned {
            table.rows.insert(id, row.clone());
            stored.push(row);
        }
        Ok(stored)
    }

    async fn update(
        &self,
        meta: &TableMeta,
        filter: &Filter,
        assignments: &Record,
        unscoped: bool,
    ) -> StoreResult<u64> {
        self.updates.fetch_add(1, AtomicOrdering::Relaxed);
        if assignments.is_empty() {
            return Ok(0);
        }
        let filter = Self::visible(meta, filter, unscoped);
        let mut tables = self.tables.write();
        let Some(table) = tables.get_mut(&meta.table) else {
            return Ok(0);
        };
        let mut affected = 0;
        for row in table.rows.values_mut().filter(|r| filter.matches(r)) {
            for (column, value) in assignments {
                if column == &meta.primary_key {
                    continue;
                }
                row.insert(column.clone(), value.clone());
            }
            affected += 1;
        }
        Ok(affected)
    }

    async fn delete(&self, meta: &TableMeta, filter: &Filter, unscoped: bool) -> StoreResult<u64> {
        self.deletes.fetch_add(1, AtomicOrdering::Relaxed);
        let filter = Self::visible(meta, filter, unscoped);
        let mut tables = self.tables.write();
        let Some(table) = tables.get_mut(&meta.table) else {
            return Ok(0);
        };

        match (&meta.soft_delete, unscoped) {
            (Some(col), false) => {
                let stamp = Value::from(now_millis());
                let mut affected = 0;
                for row in table.rows.values_mut().filter(|r| filter.matches(r)) {
                    row.insert(col.clone(), stamp.clone());
                    affected += 1;
                }
                Ok(affected)
            }
            _ => {
                let before = table.rows.len();
                table.rows.retain(|_, r| !filter.matches(r));
                Ok((before - table.rows.len()) as u64)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::filter::OrderBy;
    use serde_json::json;

    fn meta() -> TableMeta {
        TableMeta::new("t", "id").with_soft_delete("delete_time")
    }

    fn rec(v: serde_json::Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_ids() {
        let store = MemoryStore::new();
        let rows = store
            .insert(
                &meta(),
                vec![rec(json!({"name": "a"})), rec(json!({"id": 10, "name": "b"}))],
            )
            .await
            .unwrap();
        assert_eq!(rows[0]["id"], 1);
        assert_eq!(rows[1]["id"], 10);

        let rows = store
            .insert(&meta(), vec![rec(json!({"name": "c"}))])
            .await
            .unwrap();
        assert_eq!(rows[0]["id"], 11);
    }

    #[tokio::test]
    async fn test_duplicate_key_rejected_atomically() {
        let store = MemoryStore::new();
        store
            .insert(&meta(), vec![rec(json!({"id": 1}))])
            .await
            .unwrap();
        let err = store
            .insert(&meta(), vec![rec(json!({"name": "x"})), rec(json!({"id": 1}))])
            .await;
        assert!(matches!(err, Err(StoreError::Constraint(_))));
        assert_eq!(store.dump("t").len(), 1);
    }

    #[tokio::test]
    async fn test_soft_delete_hides_rows() {
        let store = MemoryStore::new();
        store
            .insert(
                &meta(),
                vec![rec(json!({"name": "a"})), rec(json!({"name": "b"}))],
            )
            .await
            .unwrap();

        let n = store
            .delete(&meta(), &Filter::eq("name", "a"), false)
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(store.count(&meta(), &Filter::All, false).await.unwrap(), 1);
        assert_eq!(store.count(&meta(), &Filter::All, true).await.unwrap(), 2);

        // soft deleted rows are not touched by scoped updates
        let mut set = Record::new();
        set.insert("name".into(), json!("z"));
        let n = store
            .update(&meta(), &Filter::All, &set, false)
            .await
            .unwrap();
        assert_eq!(n, 1);

        // unscoped delete is physical
        let n = store
            .delete(&meta(), &Filter::All, true)
            .await
            .unwrap();
        assert_eq!(n, 2);
        assert!(store.dump("t").is_empty());
    }

    #[tokio::test]
    async fn test_select_order_limit_offset() {
        let store = MemoryStore::new();
        let rows = (1..=5)
            .map(|i| rec(json!({"score": i % 3, "name": format!("n{i}")})))
            .collect();
        store.insert(&meta(), rows).await.unwrap();

        let q = SelectQuery::new(Filter::All)
            .order(vec![OrderBy::desc("score"), OrderBy::asc("id")])
            .limit(2)
            .offset(1);
        let got = store.select(&meta(), &q).await.unwrap();
        let names: Vec<_> = got.iter().map(|r| r["name"].as_str().unwrap()).collect();
        // score: n1=1 n2=2 n3=0 n4=1 n5=2 -> n2 n5 n1 n4 n3
        assert_eq!(names, vec!["n5", "n1"]);
        assert_eq!(store.stats().selects, 1);
    }
}
