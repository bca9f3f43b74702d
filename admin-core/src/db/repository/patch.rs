use crate::db::filter::Record;
use serde_json::Value;

/// Explicit field set for partial updates
///
/// Unlike sparse updates, every named field is written, so `false`, `0`
/// and `""` can be stored.
///
/// ```ignore
/// repo.update_fields(id, Patch::new().set("enable_status", false)).await?;
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    fields: Record,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(column.into(), value.into());
        self
    }

    /// Set a column to NULL
    pub fn clear(mut self, column: impl Into<String>) -> Self {
        self.fields.insert(column.into(), Value::Null);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_record(self) -> Record {
        self.fields
    }
}
