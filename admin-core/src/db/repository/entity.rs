//! Entity description consumed by the generic repository

use crate::db::filter::Record;
use crate::db::store::TableMeta;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// 实体字段配置
///
/// 默认值对应系统表的约定列名, 实体只需覆盖不同的部分。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityColumns {
    pub primary_key: &'static str,
    /// 插入时与主键一起清除的列
    pub key_aliases: &'static [&'static str],
    pub create_dept: &'static str,
    pub create_by: &'static str,
    pub create_time: &'static str,
    pub update_by: &'static str,
    pub update_time: &'static str,
    /// 软删除列, `None` 表示物理删除
    pub delete_time: Option<&'static str>,
}

impl Default for EntityColumns {
    fn default() -> Self {
        Self {
            primary_key: "id",
            key_aliases: &[],
            create_dept: "create_dept",
            create_by: "create_by",
            create_time: "create_time",
            update_by: "update_by",
            update_time: "update_time",
            delete_time: Some("delete_time"),
        }
    }
}

impl EntityColumns {
    /// Columns `save_by_key` never overwrites
    pub fn protected(&self) -> Vec<&'static str> {
        let mut cols = vec![
            self.primary_key,
            self.create_dept,
            self.create_by,
            self.create_time,
            self.update_by,
        ];
        cols.extend(self.delete_time);
        cols.extend(self.key_aliases.iter().copied());
        cols
    }

    /// Primary key plus its aliases
    pub fn keys(&self) -> Vec<&'static str> {
        let mut cols = vec![self.primary_key];
        cols.extend(self.key_aliases.iter().copied());
        cols
    }
}

/// A persisted model
///
/// Serde field names are column names. `Default` doubles as the column
/// catalogue used to validate sort parameters.
pub trait Entity: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {
    const TABLE: &'static str;

    fn columns() -> EntityColumns {
        EntityColumns::default()
    }

    /// Reset the typed primary key before insert
    fn clear_primary_key(&mut self);

    fn meta() -> TableMeta {
        let cols = Self::columns();
        let meta = TableMeta::new(Self::TABLE, cols.primary_key);
        match cols.delete_time {
            Some(col) => meta.with_soft_delete(col),
            None => meta,
        }
    }

    fn column_names() -> Vec<String> {
        match serde_json::to_value(Self::default()) {
            Ok(Value::Object(map)) => map.into_iter().map(|(k, _)| k).collect(),
            _ => Vec::new(),
        }
    }

    fn has_column(column: &str) -> bool {
        Self::column_names().iter().any(|c| c == column)
    }
}

/// Zero values skipped by sparse updates: null, false, 0, "" and []
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(_) => false,
    }
}

/// Drop zero-valued columns
pub fn sparse(record: Record) -> Record {
    record.into_iter().filter(|(_, v)| !is_zero(v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sparse_drops_zero_values() {
        let record = json!({
            "id": 0, "name": "ops", "status": false, "order_num": 0,
            "description": "", "menu_id_list": [], "pid": 4, "delete_time": null
        });
        let sparse = sparse(record.as_object().cloned().unwrap());
        let mut keys: Vec<_> = sparse.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["name", "pid"]);
    }

    #[test]
    fn test_protected_columns() {
        let cols = EntityColumns {
            key_aliases: &["uuid"],
            ..Default::default()
        };
        let protected = cols.protected();
        for c in ["id", "create_dept", "create_by", "create_time", "update_by", "delete_time", "uuid"] {
            assert!(protected.contains(&c), "{c} should be protected");
        }
        assert!(!protected.contains(&"update_time"));
    }
}
