//! 角色权限缓存集成测试

use admin_core::auth::permissions::{ROLE_CODE_CACHE_KEY, ROLE_MENU_CACHE_KEY};
use admin_core::auth::{CurrentUser, PermissionCache};
use admin_core::cache::{MemoryValueStore, ValueStore};
use admin_core::db::models::{Menu, Role};
use admin_core::db::{MemoryStore, RelationalStore};
use admin_core::{ErrorCode, Repository};
use std::sync::Arc;

struct Fixture {
    cache: PermissionCache,
    values: Arc<MemoryValueStore>,
    store: Arc<MemoryStore>,
}

/// 菜单 ID 由存储分配: 1..=3 为接口, 4..=5 为页面
async fn setup() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let values = Arc::new(MemoryValueStore::new());

    let menus: Repository<Menu> = Repository::new(store.clone(), None);
    let menus = menus
        .insert_batch(vec![
            Menu::api(0, "sys:user:add"),
            Menu::api(0, "sys:user:del"),
            Menu::api(0, "sys:role:list"),
            Menu::page(0, "Users", "/users"),
            Menu::page(0, "Roles", "/roles"),
        ])
        .await
        .unwrap();
    let ids: Vec<i64> = menus.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);

    let roles: Repository<Role> = Repository::new(store.clone(), None);
    roles
        .insert_batch(vec![
            Role::new("admin", "Admin")
                .with_menus(vec![1, 2, 3, 4, 5])
                .with_home_path("/dashboard"),
            Role::new("editor", "Editor").with_menus(vec![1, 4]),
            Role::new("auditor", "Auditor").with_menus(vec![3, 5, 4]),
        ])
        .await
        .unwrap();

    let cache = PermissionCache::new(store.clone(), values.clone());
    assert_eq!(cache.refresh().await.unwrap(), 3);
    Fixture {
        cache,
        values,
        store,
    }
}

fn codes(roles: &[&str]) -> Vec<String> {
    roles.iter().map(|r| r.to_string()).collect()
}

#[tokio::test]
async fn test_check_code_permission() {
    let f = setup().await;

    assert!(
        f.cache
            .check_role_have_code_permission(&codes(&["editor"]), &["sys:user:add"], true)
            .await
    );
    assert!(
        !f.cache
            .check_role_have_code_permission(
                &codes(&["editor"]),
                &["sys:user:add", "sys:user:del"],
                true
            )
            .await
    );
    assert!(
        f.cache
            .check_role_have_code_permission(
                &codes(&["editor"]),
                &["sys:user:add", "sys:user:del"],
                false
            )
            .await
    );
    // union over roles
    assert!(
        f.cache
            .check_role_have_code_permission(
                &codes(&["editor", "auditor"]),
                &["sys:user:add", "sys:role:list"],
                true
            )
            .await
    );
}

#[tokio::test]
async fn test_check_edge_cases() {
    let f = setup().await;
    assert!(!f.cache.check_role_have_code_permission(&[], &["sys:user:add"], false).await);
    assert!(f.cache.check_role_have_code_permission(&codes(&["editor"]), &[], true).await);
    assert!(
        !f.cache
            .check_role_have_code_permission(&codes(&["ghost"]), &["sys:user:add"], false)
            .await
    );
}

#[tokio::test]
async fn test_menu_ids_and_home_path() {
    let f = setup().await;

    assert_eq!(f.cache.role_menu_ids(&codes(&["auditor", "editor", "admin"])).await, vec![5, 4]);
    assert_eq!(f.cache.role_menu_ids(&codes(&["admin"])).await, vec![4, 5]);
    assert!(f.cache.role_menu_ids(&[]).await.is_empty());

    assert_eq!(f.cache.role_home_path("admin").await, "/dashboard");
    assert_eq!(f.cache.role_home_path("editor").await, "");
    assert_eq!(f.cache.role_home_path("ghost").await, "");
}

#[tokio::test]
async fn test_fail_closed_when_cache_offline() {
    let f = setup().await;
    f.values.set_available(false);

    assert!(
        !f.cache
            .check_role_have_code_permission(&codes(&["admin"]), &["sys:user:add"], false)
            .await
    );
    assert!(f.cache.role_menu_ids(&codes(&["admin"])).await.is_empty());
    assert_eq!(f.cache.role_home_path("admin").await, "");

    let err = f.cache.refresh().await.unwrap_err();
    assert_eq!(err.code, ErrorCode::CacheError);
}

#[tokio::test]
async fn test_cold_cache_denies() {
    let f = setup().await;
    f.values.del(ROLE_CODE_CACHE_KEY).await.unwrap();
    f.values.del(ROLE_MENU_CACHE_KEY).await.unwrap();

    assert!(
        !f.cache
            .check_role_have_code_permission(&codes(&["admin"]), &["sys:user:add"], false)
            .await
    );
    assert!(f.cache.role_menu_ids(&codes(&["admin"])).await.is_empty());
}

#[tokio::test]
async fn test_refresh_replaces_stale_entries() {
    let f = setup().await;
    let roles: Repository<Role> = Repository::new(f.store.clone(), None);
    let editor = roles
        .find_one(admin_core::Filter::eq("code", "editor"))
        .await
        .unwrap();
    roles.delete_by_keys(&[editor.id]).await.unwrap();

    assert!(
        f.cache
            .check_role_have_code_permission(&codes(&["editor"]), &["sys:user:add"], true)
            .await
    );
    assert_eq!(f.cache.refresh().await.unwrap(), 2);
    assert!(
        !f.cache
            .check_role_have_code_permission(&codes(&["editor"]), &["sys:user:add"], true)
            .await
    );
    let fields = f.values.hkeys(ROLE_CODE_CACHE_KEY).await.unwrap();
    assert!(!fields.contains(&"editor".to_string()));
    assert_eq!(f.store.dump("sys_role").len(), 3);
}

#[tokio::test]
async fn test_guards() {
    let f = setup().await;
    let user = CurrentUser::new(7, 1, codes(&["editor"]));

    assert!(f.cache.require_permission(&user, "sys:user:add").await.is_ok());
    let err = f
        .cache
        .require_permission(&user, "sys:user:del")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::PermissionDenied);

    assert!(
        f.cache
            .require_any_permission(&user, &["sys:user:del", "sys:user:add"])
            .await
            .is_ok()
    );
    assert!(
        f.cache
            .require_all_permissions(&user, &["sys:user:del", "sys:user:add"])
            .await
            .is_err()
    );

    let nobody = CurrentUser::new(8, 1, Vec::new());
    assert!(f.cache.require_any_permission(&nobody, &["sys:user:add"]).await.is_err());
}

#[tokio::test]
async fn test_refresh_works_through_store_trait() {
    // empty store: nothing cached, nothing granted
    let store: Arc<dyn RelationalStore> = Arc::new(MemoryStore::new());
    let values = Arc::new(MemoryValueStore::new());
    let cache = PermissionCache::new(store, values.clone());
    assert_eq!(cache.refresh().await.unwrap(), 0);
    assert!(values.hkeys(ROLE_CODE_CACHE_KEY).await.unwrap().is_empty());
}
