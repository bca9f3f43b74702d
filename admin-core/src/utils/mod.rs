//! 工具模块 - 通用工具函数和类型
//!
//! # 内容
//!
//! - [`AppError`] - 应用错误类型 (from shared::error)
//! - [`Clock`] - 可替换的时钟 (令牌过期计算、审计时间)
//! - 日志初始化

pub mod logger;
pub mod time;

pub use shared::error::{AppError, AppResult, ErrorCategory, ErrorCode};
pub use time::{Clock, ManualClock, SystemClock, now_millis};
