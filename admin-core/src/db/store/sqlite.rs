//! SQLite relational store
//!
//! SQL is assembled with `sqlx::QueryBuilder`; every value is a bound
//! parameter and every identifier is validated before it is quoted.

use super::{RelationalStore, SelectQuery, StoreError, StoreResult, TableMeta};
use crate::db::filter::{Filter, OrderBy, Record};
use crate::utils::now_millis;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, QueryBuilder, Row, Sqlite, SqlitePool, TypeInfo, ValueRef};

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// `"name"` after checking it is a plain identifier
fn ident(name: &str) -> StoreResult<String> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(format!("\"{name}\""))
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

fn push_value(qb: &mut QueryBuilder<'_, Sqlite>, value: &Value) {
    match value {
        Value::Null => {
            qb.push_bind(None::<i64>);
        }
        Value::Bool(b) => {
            qb.push_bind(*b);
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                qb.push_bind(i);
            } else {
                qb.push_bind(n.as_f64());
            }
        }
        Value::String(s) => {
            qb.push_bind(s.clone());
        }
        // 数组/对象以 JSON 文本存储
        other => {
            qb.push_bind(other.to_string());
        }
    }
}

fn push_compare(
    qb: &mut QueryBuilder<'_, Sqlite>,
    column: &str,
    op: &str,
    value: &Value,
) -> StoreResult<()> {
    qb.push(ident(column)?).push(op);
    push_value(qb, value);
    Ok(())
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &Filter) -> StoreResult<()> {
    match filter {
        Filter::All => {
            qb.push("1 = 1");
        }
        Filter::Eq(c, v) => push_compare(qb, c, " = ", v)?,
        Filter::Ne(c, v) => push_compare(qb, c, " <> ", v)?,
        Filter::Gt(c, v) => push_compare(qb, c, " > ", v)?,
        Filter::Ge(c, v) => push_compare(qb, c, " >= ", v)?,
        Filter::Lt(c, v) => push_compare(qb, c, " < ", v)?,
        Filter::Le(c, v) => push_compare(qb, c, " <= ", v)?,
        Filter::In(_, values) if values.is_empty() => {
            qb.push("1 = 0");
        }
        Filter::In(c, values) => {
            qb.push(ident(c)?).push(" IN (");
            let mut sep = qb.separated(", ");
            for v in values {
                match v {
                    Value::Null => sep.push_bind(None::<i64>),
                    Value::Bool(b) => sep.push_bind(*b),
                    Value::Number(n) => match n.as_i64() {
                        Some(i) => sep.push_bind(i),
                        None => sep.push_bind(n.as_f64()),
                    },
                    Value::String(s) => sep.push_bind(s.clone()),
                    other => sep.push_bind(other.to_string()),
                };
            }
            qb.push(")");
        }
        Filter::Contains(c, needle) => {
            qb.push(ident(c)?).push(" LIKE ");
            qb.push_bind(format!("%{needle}%"));
        }
        Filter::IsNull(c) => {
            qb.push(ident(c)?).push(" IS NULL");
        }
        Filter::NotNull(c) => {
            qb.push(ident(c)?).push(" IS NOT NULL");
        }
        Filter::And(fs) | Filter::Or(fs) if fs.is_empty() => {
            qb.push(if matches!(filter, Filter::And(_)) {
                "1 = 1"
            } else {
                "1 = 0"
            });
        }
        Filter::And(fs) | Filter::Or(fs) => {
            let joiner = if matches!(filter, Filter::And(_)) {
                " AND "
            } else {
                " OR "
            };
            qb.push("(");
            for (i, f) in fs.iter().enumerate() {
                if i > 0 {
                    qb.push(joiner);
                }
                push_filter(qb, f)?;
            }
            qb.push(")");
        }
        Filter::Not(f) => {
            qb.push("NOT (");
            push_filter(qb, f)?;
            qb.push(")");
        }
    }
    Ok(())
}

fn push_where(
    qb: &mut QueryBuilder<'_, Sqlite>,
    meta: &TableMeta,
    filter: &Filter,
    unscoped: bool,
) -> StoreResult<()> {
    let filter = meta.live_filter(unscoped).and(filter.clone());
    qb.push(" WHERE ");
    push_filter(qb, &filter)
}

fn push_order(qb: &mut QueryBuilder<'_, Sqlite>, order: &[OrderBy]) -> StoreResult<()> {
    for (i, term) in order.iter().enumerate() {
        qb.push(if i == 0 { " ORDER BY " } else { ", " });
        qb.push(ident(&term.column)?).push(" ").push(term.sort.as_sql());
    }
    Ok(())
}

/// Decode a row by dynamic storage class
fn row_to_record(row: &SqliteRow) -> StoreResult<Record> {
    let mut record = Record::new();
    for (i, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let storage = raw.type_info().name().to_ascii_uppercase();
            let declared = column.type_info().name().to_ascii_uppercase();
            match storage.as_str() {
                "INTEGER" if declared == "BOOLEAN" => Value::Bool(row.try_get_unchecked::<bool, _>(i)?),
                "INTEGER" => Value::from(row.try_get_unchecked::<i64, _>(i)?),
                "REAL" => Value::from(row.try_get_unchecked::<f64, _>(i)?),
                "TEXT" => Value::String(row.try_get_unchecked::<String, _>(i)?),
                "BLOB" => Value::from(row.try_get_unchecked::<Vec<u8>, _>(i)?),
                _ => return Err(StoreError::UnsupportedValue(column.name().to_string())),
            }
        };
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}

#[async_trait]
impl RelationalStore for SqliteStore {
    async fn select(&self, meta: &TableMeta, query: &SelectQuery) -> StoreResult<Vec<Record>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM ");
        qb.push(ident(&meta.table)?);
        push_where(&mut qb, meta, &query.filter, query.unscoped)?;
        push_order(&mut qb, &query.order)?;
        match (query.limit, query.offset) {
            (None, None) => {}
            (limit, offset) => {
                // SQLite 的 OFFSET 必须跟在 LIMIT 之后, -1 表示不限
                qb.push(" LIMIT ").push_bind(limit.unwrap_or(-1));
                qb.push(" OFFSET ").push_bind(offset.unwrap_or(0));
            }
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn count(&self, meta: &TableMeta, filter: &Filter, unscoped: bool) -> StoreResult<i64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM ");
        qb.push(ident(&meta.table)?);
        push_where(&mut qb, meta, filter, unscoped)?;
        let row = qb.build().fetch_one(&self.pool).await?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    async fn insert(&self, meta: &TableMeta, rows: Vec<Record>) -> StoreResult<Vec<Record>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let table = ident(&meta.table)?;
        let mut tx = self.pool.begin().await?;
        let mut stored = Vec::with_capacity(rows.len());

        for mut row in rows {
            // 0 / NULL 主键交给 SQLite 自增
            if matches!(row.get(&meta.primary_key), Some(Value::Null) | None)
                || row.get(&meta.primary_key).and_then(Value::as_i64) == Some(0)
            {
                row.remove(&meta.primary_key);
            }

            let mut qb = QueryBuilder::<Sqlite>::new("INSERT INTO ");
            qb.push(&table);
            if row.is_empty() {
                qb.push(" DEFAULT VALUES");
            } else {
                qb.push(" (");
                for (i, column) in row.keys().enumerate() {
                    if i > 0 {
                        qb.push(", ");
                    }
                    qb.push(ident(column)?);
                }
                qb.push(") VALUES (");
                for (i, value) in row.values().enumerate() {
                    if i > 0 {
                        qb.push(", ");
                    }
                    push_value(&mut qb, value);
                }
                qb.push(")");
            }
            qb.push(" RETURNING *");

            let inserted = qb.build().fetch_one(&mut *tx).await?;
            stored.push(row_to_record(&inserted)?);
        }

        tx.commit().await?;
        Ok(stored)
    }

    async fn update(
        &self,
        meta: &TableMeta,
        filter: &Filter,
        assignments: &Record,
        unscoped: bool,
    ) -> StoreResult<u64> {
        let assignments: Vec<(&String, &Value)> = assignments
            .iter()
            .filter(|(column, _)| **column != meta.primary_key)
            .collect();
        if assignments.is_empty() {
            return Ok(0);
        }

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE ");
        qb.push(ident(&meta.table)?).push(" SET ");
        for (i, (column, value)) in assignments.into_iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(ident(column)?).push(" = ");
            push_value(&mut qb, value);
        }
        push_where(&mut qb, meta, filter, unscoped)?;

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, meta: &TableMeta, filter: &Filter, unscoped: bool) -> StoreResult<u64> {
        let mut qb = match (&meta.soft_delete, unscoped) {
            (Some(col), false) => {
                let mut qb = QueryBuilder::<Sqlite>::new("UPDATE ");
                qb.push(ident(&meta.table)?)
                    .push(" SET ")
                    .push(ident(col)?)
                    .push(" = ");
                qb.push_bind(now_millis());
                qb
            }
            _ => {
                let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM ");
                qb.push(ident(&meta.table)?);
                qb
            }
        };
        push_where(&mut qb, meta, filter, unscoped)?;

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
