//! 会话令牌集成测试
//!
//! 使用 ManualClock 控制时间, 覆盖复用、续签、严格模式注销。

use admin_core::auth::jwt::{PlatformConfig, TOKEN_CACHE_KEY};
use admin_core::auth::{BearerIdentity, CallContext, CurrentUser, JwtConfig, SessionTokenManager};
use admin_core::cache::{MemoryValueStore, ValueStore};
use admin_core::utils::ManualClock;
use admin_core::ErrorCode;
use chrono::Duration;
use serde_json::{Map, Value, json};
use std::sync::Arc;

const SECRET: &str = "session-token-test-secret-0123456789abcdef";

fn config() -> JwtConfig {
    let mut config = JwtConfig::new(SECRET);
    config.expire_seconds = 1000;
    config.strict = false;
    config.platforms = vec![PlatformConfig {
        platform: "app".into(),
        expire_seconds: 100,
        strict: Some(true),
    }];
    config
}

fn setup() -> (SessionTokenManager, Arc<MemoryValueStore>, Arc<ManualClock>) {
    let values = Arc::new(MemoryValueStore::new());
    let clock = Arc::new(ManualClock::starting_now());
    let manager = SessionTokenManager::with_clock(config(), values.clone(), clock.clone());
    (manager, values, clock)
}

fn alice() -> CurrentUser {
    CurrentUser {
        uid: 7,
        username: "alice".into(),
        department_id: 3,
        nick_name: "Alice".into(),
        role_codes: vec!["admin".into()],
        platform: String::new(),
    }
}

#[tokio::test]
async fn test_reuse_within_half_life() {
    let (manager, _, clock) = setup();
    let user = alice();

    let first = manager.gen_jwt_string(&user, "web", Map::new()).await.unwrap();
    clock.advance(Duration::seconds(400));
    let second = manager.gen_jwt_string(&user, "web", Map::new()).await.unwrap();
    assert_eq!(first, second);

    // past half-life: a new token replaces the cached one
    clock.advance(Duration::seconds(200));
    let third = manager.gen_jwt_string(&user, "web", Map::new()).await.unwrap();
    assert_ne!(first, third);
    assert!(manager.valid_token(7, "web", &third).await.unwrap());

    let claims = manager.parse_jwt(&third).await.unwrap();
    assert_eq!(claims.exp, clock_unix(&clock) + 1000);
}

fn clock_unix(clock: &ManualClock) -> i64 {
    use admin_core::utils::Clock;
    clock.unix()
}

#[tokio::test]
async fn test_claims_roundtrip() {
    let (manager, _, _) = setup();
    let mut additions = Map::new();
    additions.insert("tenant".into(), json!("acme"));

    let token = manager.gen_jwt_string(&alice(), "web", additions).await.unwrap();
    let claims = manager.parse_jwt(&token).await.unwrap();
    assert_eq!(claims.uid, 7);
    assert_eq!(claims.username, "alice");
    assert_eq!(claims.department_id, 3);
    assert_eq!(claims.nick_name, "Alice");
    assert_eq!(claims.role_codes, vec!["admin".to_string()]);
    assert_eq!(claims.platform, "web");
    assert_eq!(claims.additions.get("tenant"), Some(&Value::from("acme")));
    assert_eq!(manager.expiration_of(&token).await.unwrap(), claims.exp);
}

#[tokio::test]
async fn test_reserved_additions_are_dropped() {
    let (manager, _, _) = setup();
    let mut additions = Map::new();
    additions.insert("platform".into(), json!("other"));
    additions.insert("UID".into(), json!(99));
    additions.insert("exp".into(), json!(0));
    additions.insert("tenant".into(), json!("acme"));

    let token = manager.gen_jwt_string(&alice(), "web", additions).await.unwrap();
    let claims = manager.parse_jwt(&token).await.unwrap();
    assert_eq!(claims.uid, 7);
    assert_eq!(claims.platform, "web");
    assert!(claims.exp > 0);
    assert_eq!(claims.additions.len(), 1);
    assert_eq!(claims.additions.get("tenant"), Some(&Value::from("acme")));
    assert!(manager.valid_token(7, "web", &token).await.unwrap());
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let (manager, _, clock) = setup();
    let token = manager.gen_jwt_string(&alice(), "web", Map::new()).await.unwrap();

    clock.advance(Duration::seconds(1001));
    let err = manager.parse_jwt(&token).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::TokenExpired);
    assert!(!manager.valid_token(7, "web", &token).await.unwrap());
}

#[tokio::test]
async fn test_strict_platform_revocation() {
    let (manager, values, _) = setup();
    let token = manager.gen_jwt_string(&alice(), "app", Map::new()).await.unwrap();
    assert!(manager.parse_jwt(&token).await.is_ok());
    assert!(values.hexists(TOKEN_CACHE_KEY, "7:app").await.unwrap());

    manager.remove_token(7, "app").await.unwrap();
    let err = manager.parse_jwt(&token).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::TokenExpired);

    // non-strict platform keeps working without the cache entry
    let web = manager.gen_jwt_string(&alice(), "web", Map::new()).await.unwrap();
    manager.remove_token(7, "web").await.unwrap();
    assert!(manager.parse_jwt(&web).await.is_ok());
    assert!(!manager.valid_token(7, "web", &web).await.unwrap());
}

#[tokio::test]
async fn test_platform_expiration_applies() {
    let (manager, _, clock) = setup();
    let token = manager.gen_jwt_string(&alice(), "app", Map::new()).await.unwrap();
    let claims = manager.parse_jwt(&token).await.unwrap();
    assert_eq!(claims.exp, clock_unix(&clock) + 100);

    clock.advance(Duration::seconds(60));
    let renewed = manager.gen_jwt_string(&alice(), "app", Map::new()).await.unwrap();
    assert_ne!(token, renewed);
}

#[tokio::test]
async fn test_remove_token_by_uid() {
    let (manager, values, _) = setup();
    let mut bob = alice();
    bob.uid = 70;

    for platform in ["web", "app", "desktop"] {
        manager.gen_jwt_string(&alice(), platform, Map::new()).await.unwrap();
    }
    manager.gen_jwt_string(&bob, "web", Map::new()).await.unwrap();

    assert_eq!(manager.remove_token_by_uid(7).await.unwrap(), 3);
    let mut left = values.hkeys(TOKEN_CACHE_KEY).await.unwrap();
    left.sort();
    assert_eq!(left, vec!["70:web".to_string()]);
}

#[tokio::test]
async fn test_valid_token_requires_token() {
    let (manager, _, _) = setup();
    manager.gen_jwt_string(&alice(), "web", Map::new()).await.unwrap();
    assert!(!manager.valid_token(7, "web", "").await.unwrap());
    assert!(manager.valid_token(7, "web", "anything").await.unwrap());
    assert!(!manager.valid_token(8, "web", "anything").await.unwrap());
}

#[tokio::test]
async fn test_foreign_signature_rejected() {
    let (manager, _, _) = setup();
    let other = SessionTokenManager::new(
        JwtConfig::new("another-secret-with-enough-length-000000"),
        Arc::new(MemoryValueStore::new()),
    );
    let token = other.gen_jwt_string(&alice(), "web", Map::new()).await.unwrap();
    let err = manager.parse_jwt(&token).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::TokenExpired);
}

#[tokio::test]
async fn test_cache_failure_propagates() {
    let (manager, values, _) = setup();
    values.set_available(false);
    let err = manager
        .gen_jwt_string(&alice(), "web", Map::new())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::CacheError);
}

#[tokio::test]
async fn test_bearer_identity() {
    let (manager, _, _) = setup();
    let token = manager.gen_jwt_string(&alice(), "web", Map::new()).await.unwrap();

    let header = format!("Bearer {token}");
    let identity = BearerIdentity::from_header(&header, manager.clone()).expect("bearer");
    let ctx = CallContext::with_resolver(Arc::new(identity));
    let user = ctx.current_user().await.unwrap().expect("user");
    assert_eq!(user.uid, 7);
    assert_eq!(user.platform, "web");

    let bad = CallContext::with_resolver(Arc::new(BearerIdentity::new("garbage", manager)));
    let err = bad.current_user().await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotAuthenticated);
}
