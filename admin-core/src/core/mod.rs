//! 核心模块 - 配置与状态
//!
//! # 模块结构
//!
//! - [`Config`] - 配置
//! - [`ServerState`] - 组件句柄集合

pub mod config;
pub mod state;

pub use config::Config;
pub use state::ServerState;
