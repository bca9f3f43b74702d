//! Admin Core - 管理后台核心
//!
//! # 架构概述
//!
//! 通用 CRUD 仓储 + 行级数据权限 + 角色权限缓存 + 会话令牌:
//!
//! - **仓储** (`db::repository`): 模型/视图投影、分页、主键约束
//! - **钩子** (`hooks`): 按调用方的数据策略改写查询与写入
//! - **数据权限** (`scope`): 角色策略合并、部门树
//! - **认证** (`auth`): JWT 会话令牌、权限缓存
//! - **缓存** (`cache`): 键值 / hash 缓存抽象
//!
//! # 模块结构
//!
//! ```text
//! admin-core/src/
//! ├── core/          # 配置、状态
//! ├── auth/          # 身份、JWT、权限
//! ├── cache/         # ValueStore
//! ├── db/            # 过滤器、存储、模型、仓储
//! ├── scope/         # 数据权限、部门、角色
//! ├── hooks.rs       # 仓储钩子
//! └── utils/         # 日志、时钟
//! ```

pub mod auth;
pub mod cache;
pub mod core;
pub mod db;
pub mod hooks;
pub mod scope;
pub mod utils;

// Re-export 公共类型
pub use auth::{CallContext, CurrentUser, PermissionCache, SessionTokenManager};
pub use core::{Config, ServerState};
pub use db::repository::{Entity, Patch, Repository};
pub use db::{Filter, RelationalStore};
pub use hooks::HookEngine;
pub use utils::{AppError, AppResult, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};
