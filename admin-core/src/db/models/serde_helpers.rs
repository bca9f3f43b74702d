//! Common serde helpers for values coming back from SQLite
//!
//! SQLite 没有原生布尔/数组类型：
//! - 布尔值存为 0/1
//! - 数组存为 JSON 文本
//!
//! 内存存储则直接保留 JSON 原始类型，所以两种格式都要接受。

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// Deserialize bool from `true`/`false`, `0`/`1` or null (false)
pub fn flex_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(b),
        Some(Value::Number(n)) => Ok(n.as_i64().unwrap_or(0) != 0),
        Some(other) => Err(de::Error::custom(format!("expected bool, got {other}"))),
    }
}

/// Deserialize a list from a JSON array, JSON text or null (empty)
pub fn flex_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(Vec::new()),
        Some(Value::String(s)) => serde_json::from_str(&s).map_err(de::Error::custom),
        Some(v @ Value::Array(_)) => serde_json::from_value(v).map_err(de::Error::custom),
        Some(other) => Err(de::Error::custom(format!("expected list, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "flex_bool")]
        flag: bool,
        #[serde(default, deserialize_with = "flex_vec")]
        ids: Vec<i64>,
    }

    #[test]
    fn test_flex_formats() {
        let p: Probe = serde_json::from_value(json!({"flag": 1, "ids": "[1,2]"})).unwrap();
        assert!(p.flag);
        assert_eq!(p.ids, vec![1, 2]);

        let p: Probe = serde_json::from_value(json!({"flag": false, "ids": [3]})).unwrap();
        assert!(!p.flag);
        assert_eq!(p.ids, vec![3]);

        let p: Probe = serde_json::from_value(json!({"flag": null})).unwrap();
        assert!(!p.flag);
        assert!(p.ids.is_empty());
    }
}
