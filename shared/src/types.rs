//! Paging and sorting parameters accepted by the generic repository

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 分页参数 (page 从 1 开始)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PageParam {
    #[validate(range(min = 1, message = "page must be at least 1"))]
    pub page: i64,
    #[validate(range(min = 1, message = "pageSize must be at least 1"))]
    pub page_size: i64,
}

impl PageParam {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self { page, page_size }
    }

    /// Validate and map failures into `ValidationFailed`
    ///
    /// The last row of the page must be addressable as an `i64`.
    pub fn check(&self) -> AppResult<()> {
        self.validate().map_err(|e| {
            let fields: Vec<String> = e.field_errors().keys().map(|k| k.to_string()).collect();
            AppError::validation(format!("invalid page parameter: {}", fields.join(", ")))
                .with_detail("fields", fields)
        })?;
        (self.page - 1)
            .checked_mul(self.page_size)
            .and_then(|offset| offset.checked_add(self.page_size))
            .ok_or_else(|| {
                AppError::validation(format!(
                    "page {} with pageSize {} is out of range",
                    self.page, self.page_size
                ))
                .with_detail("fields", vec!["page", "pageSize"])
            })?;
        Ok(())
    }

    /// Row offset of the first item on this page, saturating at `i64::MAX`
    pub fn offset(&self) -> i64 {
        (self.page - 1).max(0).saturating_mul(self.page_size)
    }
}

/// 分页结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub last_page: bool,
}

impl<T> PageResult<T> {
    /// Project every item, keeping paging metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageResult<U> {
        PageResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
            last_page: self.last_page,
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortType {
    #[default]
    Asc,
    Desc,
}

impl SortType {
    /// Accepts `ASC`, `DESC` (any case) or empty (ascending)
    pub fn parse(s: &str) -> AppResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            other => Err(AppError::validation(format!("unsupported sort type: {other}"))
                .with_detail("field", "sortType")),
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// 排序参数, sort_name 可以是 camelCase 或 snake_case
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderParam {
    #[serde(default)]
    pub sort_name: String,
    #[serde(default)]
    pub sort_type: String,
}

impl OrderParam {
    pub fn new(sort_name: impl Into<String>, sort_type: impl Into<String>) -> Self {
        Self {
            sort_name: sort_name.into(),
            sort_type: sort_type.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sort_name.trim().is_empty()
    }

    /// Column name in snake_case (`createTime` -> `create_time`)
    pub fn column(&self) -> String {
        camel_to_snake(self.sort_name.trim())
    }
}

/// camelCase -> snake_case
pub fn camel_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
