use crate::auth::JwtConfig;
use shared::error::{AppError, AppResult};

/// 核心配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | DATABASE_URL | sqlite://admin.db?mode=rwc | 数据库连接 |
/// | DB_MAX_CONNECTIONS | 10 | 连接池上限 |
/// | LOG_LEVEL | info | 日志级别 (RUST_LOG 优先) |
/// | LOG_JSON | false | 是否输出 JSON 日志 |
/// | LOG_DIR | (无) | 日志目录, 设置后按天滚动写文件 |
/// | ENVIRONMENT | development | 运行环境 |
///
/// JWT 相关变量见 [`JwtConfig::from_env`]。
///
/// # 示例
///
/// ```ignore
/// DATABASE_URL=sqlite:///data/admin.db JWT_PLATFORMS=app:604800:true cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    /// JWT 认证配置
    pub jwt: JwtConfig,
    pub log_level: String,
    pub log_json: bool,
    pub log_dir: Option<String>,
    /// 运行环境: development | staging | production
    pub environment: String,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> AppResult<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://admin.db?mode=rwc".into()),
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            jwt: JwtConfig::from_env()?,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: std::env::var("LOG_JSON")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.is_empty()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        })
    }

    /// 先读取 `.env` 再加载环境变量
    pub fn load() -> AppResult<Self> {
        if let Err(e) = dotenv::dotenv() {
            tracing::debug!(error = %e, ".env not loaded");
        }
        let config = Self::from_env()?;
        if config.is_production() && config.database_url.starts_with("sqlite::memory:") {
            return Err(AppError::config("in-memory database is not allowed in production"));
        }
        Ok(config)
    }

    /// 测试用: 内存数据库 + 固定密钥
    pub fn for_tests(secret: impl Into<String>) -> Self {
        Self {
            database_url: "sqlite::memory:".into(),
            db_max_connections: 1,
            jwt: JwtConfig::new(secret),
            log_level: "debug".into(),
            log_json: false,
            log_dir: None,
            environment: "test".into(),
        }
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
