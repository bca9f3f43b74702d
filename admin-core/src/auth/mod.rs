//! 认证授权模块
//!
//! - [`CallContext`] / [`CurrentUser`] - 调用方身份
//! - [`SessionTokenManager`] - JWT 会话令牌
//! - [`PermissionCache`] - 角色权限缓存与守卫

pub mod identity;
pub mod jwt;
pub mod permissions;

pub use identity::{CallContext, CurrentUser, IdentityResolver, StaticIdentity};
pub use jwt::{
    BearerIdentity, Claims, JwtConfig, JwtError, PlatformConfig, SessionTokenManager, TokenInfo,
};
pub use permissions::{PermissionCache, RolePermissions, build_role_map};
