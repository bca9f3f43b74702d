//! JWT 会话令牌管理
//!
//! 每个 `(uid, platform)` 最多一个有效令牌, 记录在 ValueStore 的
//! `sys:token:info:` hash 中 (字段 `"{uid}:{platform}"`)。
//!
//! - 剩余有效期超过一半时复用缓存中的令牌
//! - 严格模式的平台要求缓存记录存在, 删除记录即可让令牌失效
//! - 解析失败一律视为令牌过期

use crate::auth::identity::{CurrentUser, IdentityResolver};
use crate::cache::{HashCache, ValueStore};
use crate::utils::{Clock, SystemClock};
use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared::error::{AppError, AppResult};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use validator::Validate;

pub const TOKEN_CACHE_KEY: &str = "sys:token:info:";

/// Claims 自身占用的键, `additions` 中的同名键会被丢弃
pub const RESERVED_CLAIMS: [&str; 7] = [
    "UID",
    "username",
    "departmentId",
    "nickName",
    "roleCodes",
    "platform",
    "exp",
];

/// 默认令牌有效期 (秒)
pub const DEFAULT_EXPIRE_SECONDS: i64 = 86_400;

/// 平台级覆盖配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub platform: String,
    /// 有效期 (秒), <= 0 时使用全局值
    pub expire_seconds: i64,
    /// 未设置时使用全局值
    pub strict: Option<bool>,
}

impl PlatformConfig {
    /// 解析 `platform:expire[:strict]`
    pub fn parse(entry: &str) -> Result<Self, JwtError> {
        let parts: Vec<&str> = entry.trim().split(':').map(str::trim).collect();
        let invalid = || JwtError::ConfigError(format!("invalid platform entry: {entry}"));
        match parts.as_slice() {
            [platform, expire] | [platform, expire, _] if !platform.is_empty() => {
                let expire_seconds = expire.parse().map_err(|_| invalid())?;
                let strict = match parts.get(2) {
                    Some(s) => Some(s.parse().map_err(|_| invalid())?),
                    None => None,
                };
                Ok(Self {
                    platform: platform.to_string(),
                    expire_seconds,
                    strict,
                })
            }
            _ => Err(invalid()),
        }
    }
}

/// JWT 配置
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct JwtConfig {
    /// JWT 密钥 (至少 32 字节)
    #[validate(length(min = 32, message = "JWT_SECRET must be at least 32 characters long"))]
    pub secret: String,
    /// 全局有效期 (秒)
    #[validate(range(min = 1, message = "JWT_EXPIRE_SECONDS must be positive"))]
    pub expire_seconds: i64,
    /// 全局严格模式
    pub strict: bool,
    /// 平台覆盖
    pub platforms: Vec<PlatformConfig>,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"***")
            .field("expire_seconds", &self.expire_seconds)
            .field("strict", &self.strict)
            .field("platforms", &self.platforms)
            .finish()
    }
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expire_seconds: DEFAULT_EXPIRE_SECONDS,
            strict: false,
            platforms: Vec::new(),
        }
    }

    /// 从环境变量加载
    ///
    /// | 环境变量 | 默认值 |
    /// |----------|--------|
    /// | JWT_SECRET | (开发环境自动生成) |
    /// | JWT_EXPIRE_SECONDS | 86400 |
    /// | JWT_STRICT | false |
    /// | JWT_PLATFORMS | 空, 格式 `app:604800:true,web:3600` |
    pub fn from_env() -> Result<Self, JwtError> {
        let secret = String::from_utf8(load_jwt_secret()?)
            .map_err(|_| JwtError::ConfigError("JWT_SECRET must be valid UTF-8".into()))?;

        let platforms = match std::env::var("JWT_PLATFORMS") {
            Ok(raw) => raw
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(PlatformConfig::parse)
                .collect::<Result<Vec<_>, _>>()?,
            Err(_) => Vec::new(),
        };

        let config = Self {
            secret,
            expire_seconds: std::env::var("JWT_EXPIRE_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_EXPIRE_SECONDS),
            strict: std::env::var("JWT_STRICT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
            platforms,
        };
        config
            .validate()
            .map_err(|e| JwtError::ConfigError(e.to_string()))?;
        Ok(config)
    }

    fn platform(&self, platform: &str) -> Option<&PlatformConfig> {
        if platform.is_empty() {
            return None;
        }
        self.platforms.iter().find(|p| p.platform == platform)
    }
}

/// 存储在令牌中的 JWT Claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "UID")]
    pub uid: i64,
    #[serde(default)]
    pub username: String,
    #[serde(rename = "departmentId", default)]
    pub department_id: i64,
    #[serde(rename = "nickName", default)]
    pub nick_name: String,
    #[serde(rename = "roleCodes", default)]
    pub role_codes: Vec<String>,
    #[serde(default)]
    pub platform: String,
    /// 过期时间戳 (秒)
    pub exp: i64,
    /// 附加声明
    #[serde(flatten)]
    pub additions: Map<String, Value>,
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            uid: claims.uid,
            username: claims.username,
            department_id: claims.department_id,
            nick_name: claims.nick_name,
            role_codes: claims.role_codes,
            platform: claims.platform,
        }
    }
}

/// 缓存中的令牌记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub token: String,
    /// 过期时间戳 (秒)
    #[serde(rename = "expireAt")]
    pub expire_at: i64,
}

/// JWT 错误
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("无效令牌: {0}")]
    InvalidToken(String),

    #[error("令牌已过期")]
    ExpiredToken,

    #[error("无效签名")]
    InvalidSignature,

    #[error("令牌已被注销")]
    Revoked,

    #[error("令牌生成失败: {0}")]
    GenerationFailed(String),

    #[error("密钥生成失败: {0}")]
    KeyGenerationFailed(String),

    #[error("配置错误: {0}")]
    ConfigError(String),
}

impl From<JwtError> for AppError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::GenerationFailed(msg) => AppError::token_generation(msg),
            JwtError::KeyGenerationFailed(msg) | JwtError::ConfigError(msg) => AppError::config(msg),
            other => AppError::token_expired().with_detail("reason", other.to_string()),
        }
    }
}

/// 生成安全的 JWT 密钥 (随机字节)
pub fn generate_secure_jwt_secret() -> Result<Vec<u8>, JwtError> {
    let rng = SystemRandom::new();
    let mut key = vec![0u8; 32]; // 256-bit key

    rng.fill(&mut key).map_err(|_| {
        JwtError::KeyGenerationFailed("Failed to generate secure random key".to_string())
    })?;

    Ok(key)
}

/// 生成可打印的安全 JWT 密钥 (用于开发环境)
pub fn generate_secure_printable_jwt_secret() -> Result<String, JwtError> {
    const ALLOWED: &[u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*()-_=+[]{}|;:,.<>?";

    let rng = SystemRandom::new();
    let mut bytes = [0u8; 64];
    rng.fill(&mut bytes).map_err(|_| {
        JwtError::KeyGenerationFailed("Failed to generate secure random key".to_string())
    })?;

    Ok(bytes
        .iter()
        .map(|b| ALLOWED[*b as usize % ALLOWED.len()] as char)
        .collect())
}

/// 从环境变量安全地加载 JWT 密钥
fn load_jwt_secret() -> Result<Vec<u8>, JwtError> {
    match std::env::var("JWT_SECRET") {
        Ok(secret) => Ok(secret.into_bytes()),
        Err(_) => {
            #[cfg(debug_assertions)]
            {
                tracing::warn!(
                    "⚠️  JWT_SECRET not set! Generating secure temporary key for development."
                );
                Ok(generate_secure_printable_jwt_secret()?.into_bytes())
            }
            #[cfg(not(debug_assertions))]
            {
                Err(JwtError::ConfigError(
                    "JWT_SECRET environment variable must be set in production!".to_string(),
                ))
            }
        }
    }
}

fn token_field(uid: i64, platform: &str) -> String {
    format!("{uid}:{platform}")
}

/// 会话令牌管理器
#[derive(Clone)]
pub struct SessionTokenManager {
    config: Arc<JwtConfig>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    tokens: HashCache<TokenInfo>,
    clock: Arc<dyn Clock>,
}

impl SessionTokenManager {
    pub fn new(config: JwtConfig, values: Arc<dyn ValueStore>) -> Self {
        Self::with_clock(config, values, Arc::new(SystemClock))
    }

    pub fn with_clock(config: JwtConfig, values: Arc<dyn ValueStore>, clock: Arc<dyn Clock>) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config: Arc::new(config),
            encoding_key,
            decoding_key,
            tokens: HashCache::new(values, TOKEN_CACHE_KEY),
            clock,
        }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// 平台有效期 (秒): 覆盖值 > 0 时使用覆盖值, 否则全局值
    pub fn platform_expiration(&self, platform: &str) -> i64 {
        match self.config.platform(platform) {
            Some(p) if p.expire_seconds > 0 => p.expire_seconds,
            _ => self.config.expire_seconds,
        }
    }

    /// 平台严格模式: 有覆盖值时使用覆盖值, 否则全局值
    pub fn platform_strict(&self, platform: &str) -> bool {
        self.config
            .platform(platform)
            .and_then(|p| p.strict)
            .unwrap_or(self.config.strict)
    }

    /// 签发 (或复用) 用户在该平台的令牌
    ///
    /// 缓存中的令牌剩余有效期超过一半时直接返回, 此时 `additions` 不生效。
    /// `additions` 不能覆盖 [`RESERVED_CLAIMS`]。
    pub async fn gen_jwt_string(
        &self,
        user: &CurrentUser,
        platform: &str,
        mut additions: Map<String, Value>,
    ) -> AppResult<String> {
        let now = self.clock.unix();
        let expiration = self.platform_expiration(platform);
        let field = token_field(user.uid, platform);

        if let Some(info) = self.tokens.get(&field).await?
            && !info.token.is_empty()
            && info.expire_at > now + expiration / 2
        {
            tracing::debug!(uid = user.uid, platform, "reusing session token");
            return Ok(info.token);
        }

        for key in RESERVED_CLAIMS {
            if additions.remove(key).is_some() {
                tracing::debug!(uid = user.uid, key, "reserved claim dropped from additions");
            }
        }

        let claims = Claims {
            uid: user.uid,
            username: user.username.clone(),
            department_id: user.department_id,
            nick_name: user.nick_name.clone(),
            role_codes: user.role_codes.clone(),
            platform: platform.to_string(),
            exp: now + expiration,
            additions,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::GenerationFailed(e.to_string()))?;

        self.tokens
            .put(
                &field,
                &TokenInfo {
                    token: token.clone(),
                    expire_at: claims.exp,
                },
            )
            .await?;
        tracing::info!(uid = user.uid, platform, exp = claims.exp, "session token issued");
        Ok(token)
    }

    /// 校验签名, 不检查过期
    fn decode_claims(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
                ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                _ => JwtError::InvalidToken(e.to_string()),
            })
    }

    /// 解析令牌; 任何失败都返回 `TokenExpired`
    pub async fn parse_jwt(&self, token: &str) -> AppResult<Claims> {
        let claims = self.decode_claims(token)?;
        if claims.exp <= self.clock.unix() {
            return Err(JwtError::ExpiredToken.into());
        }
        if self.platform_strict(&claims.platform)
            && !self
                .tokens
                .exists(&token_field(claims.uid, &claims.platform))
                .await?
        {
            tracing::debug!(uid = claims.uid, platform = %claims.platform, "strict token has no session");
            return Err(JwtError::Revoked.into());
        }
        Ok(claims)
    }

    /// 令牌的过期时间 (秒), 只要求签名有效
    pub async fn expiration_of(&self, token: &str) -> AppResult<i64> {
        Ok(self.decode_claims(token)?.exp)
    }

    pub async fn remove_token(&self, uid: i64, platform: &str) -> AppResult<()> {
        self.tokens.remove(&[token_field(uid, platform)]).await?;
        tracing::info!(uid, platform, "session token removed");
        Ok(())
    }

    /// 注销用户在所有平台的令牌
    pub async fn remove_token_by_uid(&self, uid: i64) -> AppResult<u64> {
        let prefix = format!("{uid}:");
        let fields: Vec<String> = self
            .tokens
            .fields()
            .await?
            .into_iter()
            .filter(|f| f.starts_with(&prefix))
            .collect();
        let removed = self.tokens.remove(&fields).await?;
        tracing::info!(uid, removed, "session tokens removed");
        Ok(removed)
    }

    /// 缓存中存在未过期的会话 (不校验令牌本身)
    pub async fn valid_token(&self, uid: i64, platform: &str, token: &str) -> AppResult<bool> {
        if token.is_empty() {
            return Ok(false);
        }
        Ok(match self.tokens.get(&token_field(uid, platform)).await? {
            Some(info) => !info.token.is_empty() && info.expire_at > self.clock.unix(),
            None => false,
        })
    }

    /// 从 Authorization 头提取令牌
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty())
    }
}

/// 以 Bearer 令牌作为调用方身份
#[derive(Clone)]
pub struct BearerIdentity {
    token: String,
    manager: SessionTokenManager,
}

impl BearerIdentity {
    pub fn new(token: impl Into<String>, manager: SessionTokenManager) -> Self {
        Self {
            token: token.into(),
            manager,
        }
    }

    /// 从 `Authorization` 头构造
    pub fn from_header(header: &str, manager: SessionTokenManager) -> Option<Self> {
        SessionTokenManager::extract_from_header(header).map(|t| Self::new(t, manager))
    }
}

#[async_trait]
impl IdentityResolver for BearerIdentity {
    async fn current_user(&self) -> AppResult<CurrentUser> {
        self.manager.parse_jwt(&self.token).await.map(CurrentUser::from)
    }
}
