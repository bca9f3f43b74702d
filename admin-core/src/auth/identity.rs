//! 调用方身份与调用上下文
//!
//! [`CallContext`] 随每次仓储调用传递, 携带:
//! - 可选的身份解析能力 ([`IdentityResolver`])
//! - 跳过钩子的标记 (启动、缓存重建、登录查询)
//!
//! 身份在同一个上下文中最多解析一次。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, AppResult};
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// 当前用户 (已认证的调用方)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub uid: i64,
    pub username: String,
    pub department_id: i64,
    pub nick_name: String,
    pub role_codes: Vec<String>,
    pub platform: String,
}

impl CurrentUser {
    pub fn new(uid: i64, department_id: i64, role_codes: Vec<String>) -> Self {
        Self {
            uid,
            department_id,
            role_codes,
            ..Default::default()
        }
    }
}

/// 身份解析能力, 由认证层提供
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn current_user(&self) -> AppResult<CurrentUser>;
}

/// 已知身份
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub CurrentUser);

#[async_trait]
impl IdentityResolver for StaticIdentity {
    async fn current_user(&self) -> AppResult<CurrentUser> {
        Ok(self.0.clone())
    }
}

/// Per-call context
#[derive(Clone, Default)]
pub struct CallContext {
    resolver: Option<Arc<dyn IdentityResolver>>,
    skip: bool,
    resolved: Arc<OnceCell<CurrentUser>>,
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("has_identity", &self.resolver.is_some())
            .field("skip", &self.skip)
            .field("resolved", &self.resolved.get().map(|u| u.uid))
            .finish()
    }
}

impl CallContext {
    /// 后台上下文: 没有身份, 钩子不生效
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_resolver(resolver: Arc<dyn IdentityResolver>) -> Self {
        Self {
            resolver: Some(resolver),
            ..Default::default()
        }
    }

    pub fn for_user(user: CurrentUser) -> Self {
        Self::with_resolver(Arc::new(StaticIdentity(user)))
    }

    /// 同一身份, 但跳过所有钩子
    pub fn skip_hooks(&self) -> Self {
        Self {
            skip: true,
            ..self.clone()
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skip
    }

    pub fn has_identity(&self) -> bool {
        self.resolver.is_some()
    }

    /// Resolve the caller, memoized
    ///
    /// `Ok(None)` when no resolver is attached. A failing resolver yields
    /// `NotAuthenticated`, except for infrastructure failures which keep
    /// their own code.
    pub async fn current_user(&self) -> AppResult<Option<CurrentUser>> {
        let Some(resolver) = &self.resolver else {
            return Ok(None);
        };
        let user = self
            .resolved
            .get_or_try_init(|| async {
                resolver.current_user().await.map_err(|e| {
                    if e.is_system() {
                        e
                    } else {
                        AppError::identity(e.message.clone())
                            .with_detail("cause", e.code.code())
                    }
                })
            })
            .await?;
        Ok(Some(user.clone()))
    }
}
