//! Query filter AST
//!
//! Repositories and hooks compose [`Filter`] values; each [`RelationalStore`]
//! translates them (SQL for SQLite, direct evaluation for the memory store).
//! Comparisons against NULL never match, the same way SQL treats them.
//!
//! [`RelationalStore`]: super::store::RelationalStore

use serde_json::{Map, Value};
use shared::SortType;
use std::cmp::Ordering;

/// A row as exchanged with the store, keyed by column name
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// Matches every row
    #[default]
    All,
    Eq(String, Value),
    Ne(String, Value),
    Gt(String, Value),
    Ge(String, Value),
    Lt(String, Value),
    Le(String, Value),
    In(String, Vec<Value>),
    /// Substring match (`LIKE %x%`)
    Contains(String, String),
    IsNull(String),
    NotNull(String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(column.into(), value.into())
    }

    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne(column.into(), value.into())
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gt(column.into(), value.into())
    }

    pub fn ge(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ge(column.into(), value.into())
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lt(column.into(), value.into())
    }

    pub fn le(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Le(column.into(), value.into())
    }

    pub fn is_in<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::In(column.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn contains(column: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::Contains(column.into(), needle.into())
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self::IsNull(column.into())
    }

    pub fn not_null(column: impl Into<String>) -> Self {
        Self::NotNull(column.into())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Conjunction; `All` is the identity
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), f) => {
                left.push(f);
                Filter::And(left)
            }
            (f, Filter::And(mut right)) => {
                right.insert(0, f);
                Filter::And(right)
            }
            (a, b) => Filter::And(vec![a, b]),
        }
    }

    pub fn or(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::Or(mut left), Filter::Or(right)) => {
                left.extend(right);
                Filter::Or(left)
            }
            (Filter::Or(mut left), f) => {
                left.push(f);
                Filter::Or(left)
            }
            (a, b) => Filter::Or(vec![a, b]),
        }
    }

    /// Evaluate against an in-memory row; a missing column reads as NULL
    pub fn matches(&self, row: &Record) -> bool {
        let get = |c: &str| row.get(c).unwrap_or(&Value::Null);
        match self {
            Filter::All => true,
            Filter::Eq(c, v) => compare(get(c), v) == Some(Ordering::Equal),
            Filter::Ne(c, v) => matches!(compare(get(c), v), Some(o) if o != Ordering::Equal),
            Filter::Gt(c, v) => compare(get(c), v) == Some(Ordering::Greater),
            Filter::Ge(c, v) => matches!(
                compare(get(c), v),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Filter::Lt(c, v) => compare(get(c), v) == Some(Ordering::Less),
            Filter::Le(c, v) => matches!(
                compare(get(c), v),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Filter::In(c, vs) => {
                let cell = get(c);
                vs.iter().any(|v| compare(cell, v) == Some(Ordering::Equal))
            }
            Filter::Contains(c, needle) => match get(c) {
                Value::String(s) => s.to_lowercase().contains(&needle.to_lowercase()),
                _ => false,
            },
            Filter::IsNull(c) => get(c).is_null(),
            Filter::NotNull(c) => !get(c).is_null(),
            Filter::And(fs) => fs.iter().all(|f| f.matches(row)),
            Filter::Or(fs) => fs.iter().any(|f| f.matches(row)),
            Filter::Not(f) => !f.matches(row),
        }
    }
}

/// Ordering between two cells; `None` when either side is NULL or the
/// kinds are not comparable
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        // SQLite 以 0/1 存储布尔值
        (Value::Bool(x), Value::Number(y)) | (Value::Number(y), Value::Bool(x)) => {
            let y = y.as_i64()?;
            let ord = i64::from(*x).cmp(&y);
            Some(if matches!(a, Value::Bool(_)) { ord } else { ord.reverse() })
        }
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Array(x), Value::Array(y)) if x == y => Some(Ordering::Equal),
        _ => None,
    }
}

/// One ORDER BY term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub sort: SortType,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            sort: SortType::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            sort: SortType::Desc,
        }
    }
}
