//! SQLite 存储集成测试
//!
//! 使用临时目录中的数据库文件, 通过 DbService 执行迁移。

use admin_core::auth::{CallContext, CurrentUser};
use admin_core::cache::MemoryValueStore;
use admin_core::db::models::{DataStrategy, Department, Notice, Role};
use admin_core::db::repository::Patch;
use admin_core::db::{DbService, Filter, RelationalStore};
use admin_core::{Config, Entity, ErrorCode, Repository, ServerState};
use serde_json::Value;
use shared::{OrderParam, PageParam};
use std::sync::Arc;
use tempfile::TempDir;

async fn open() -> (TempDir, Arc<dyn RelationalStore>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("admin.db");
    let db = DbService::new(&path.to_string_lossy(), 2)
        .await
        .expect("open database");
    (dir, Arc::new(db.store()))
}

#[tokio::test]
async fn test_crud_roundtrip() {
    let (_dir, store) = open().await;
    let repo: Repository<Notice> = Repository::new(store.clone(), None);

    let mut n = Notice::new("Quarterly review");
    n.content = "Agenda attached".into();
    n.pinned = true;
    let created = repo.insert_one(n).await.unwrap();
    assert!(created.id > 0);
    assert!(created.pinned);
    assert!(created.audit.create_time > 0);
    assert_eq!(created.audit.delete_time, None);

    let found = repo.find_one_by_key(created.id).await.unwrap();
    assert_eq!(found.title, "Quarterly review");

    repo.update_fields(created.id, Patch::new().set("pinned", false))
        .await
        .unwrap();
    assert!(!repo.find_one_by_key(created.id).await.unwrap().pinned);
    let err = repo
        .update_fields(created.id, Patch::new().set("colour", "red"))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);

    assert_eq!(repo.delete_by_keys(&[created.id]).await.unwrap(), 1);
    let err = repo.find_one_by_key(created.id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);

    // soft-deleted row is still there
    let deleted = repo.unscoped().find_one_by_key(created.id).await.unwrap();
    assert!(deleted.audit.delete_time.is_some());

    // unscoped delete is physical
    assert_eq!(repo.unscoped().delete_by_keys(&[created.id]).await.unwrap(), 1);
    assert_eq!(repo.unscoped().count(Filter::All).await.unwrap(), 0);
}

#[tokio::test]
async fn test_filters_and_paging() {
    let (_dir, store) = open().await;
    let repo: Repository<Notice> = Repository::new(store, None);
    repo.insert_batch(
        (1..=12)
            .map(|i| {
                let mut n = Notice::new(format!("Notice {i:02}"));
                n.pinned = i % 3 == 0;
                n
            })
            .collect(),
    )
    .await
    .unwrap();

    assert_eq!(repo.count(Filter::eq("pinned", true)).await.unwrap(), 4);
    assert_eq!(
        repo.count(Filter::contains("title", "notice 1")).await.unwrap(),
        3
    );
    assert_eq!(
        repo.count(Filter::is_in("id", [1, 2, 3]).and(Filter::ne("id", 2)))
            .await
            .unwrap(),
        2
    );
    assert_eq!(repo.count(Filter::is_in("id", Vec::<i64>::new())).await.unwrap(), 0);
    assert_eq!(repo.count(Filter::gt("id", 10).not()).await.unwrap(), 10);

    let page = repo
        .find_page_sorted(
            PageParam::new(3, 5),
            Filter::All,
            &[OrderParam::new("title", "asc")],
        )
        .await
        .unwrap();
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total, 12);
    assert!(page.last_page);
    assert_eq!(page.items[0].title, "Notice 11");

    let page = repo.find_page(PageParam::new(1, 6), Filter::All).await.unwrap();
    assert_eq!(page.total, 12);
    assert!(!page.last_page);
}

#[tokio::test]
async fn test_role_columns_roundtrip() {
    let (_dir, store) = open().await;
    let repo: Repository<Role> = Repository::new(store, None);

    let admin = repo
        .insert_one(
            Role::new("admin", "Admin")
                .with_strategies(DataStrategy::AllData, DataStrategy::DepartmentAndBelow)
                .with_menus(vec![3, 1, 2])
                .with_home_path("/dashboard"),
        )
        .await
        .unwrap();
    let plain = repo.insert_one(Role::new("plain", "Plain")).await.unwrap();

    let admin = repo.find_one_by_key(admin.id).await.unwrap();
    assert_eq!(admin.menu_id_list, vec![3, 1, 2]);
    assert_eq!(admin.query_strategy, Some(DataStrategy::AllData));
    assert_eq!(admin.update_strategy, Some(DataStrategy::DepartmentAndBelow));
    assert!(admin.enable_status);

    let plain = repo.find_one_by_key(plain.id).await.unwrap();
    assert_eq!(plain.query_strategy, None);
    assert!(plain.menu_id_list.is_empty());

    repo.update_fields(plain.id, Patch::new().set("enable_status", false))
        .await
        .unwrap();
    assert!(!repo.find_one_by_key(plain.id).await.unwrap().enable_status);
}

#[tokio::test]
async fn test_department_scope_on_sqlite() {
    let (_dir, store) = open().await;
    let state = ServerState::with_stores(
        Config::for_tests("sqlite-scope-test-secret-0123456789abcdef"),
        store.clone(),
        Arc::new(MemoryValueStore::new()),
    )
    .await
    .unwrap();

    let departments: Vec<_> = [(1, 0), (3, 1), (9, 3), (2, 0)]
        .into_iter()
        .filter_map(|(id, pid)| match serde_json::to_value(Department::new(id, pid, "d")) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        })
        .collect();
    store.insert(&Department::meta(), departments).await.unwrap();

    let roles: Repository<Role> = state.repository().skip_hooks();
    roles
        .insert_one(
            Role::new("dept", "Department")
                .with_strategies(DataStrategy::DepartmentAndBelow, DataStrategy::PersonalOnly),
        )
        .await
        .unwrap();
    state.on_roles_changed().await.unwrap();

    let seed: Repository<Notice> = state.repository().skip_hooks();
    for (title, dept, by) in [("a", 1, 5), ("b", 2, 8), ("c", 3, 5), ("d", 9, 5), ("e", 2, 7)] {
        let mut n = Notice::new(title);
        n.audit.create_dept = dept;
        n.audit.create_by = by;
        seed.insert_one(n).await.unwrap();
    }

    let ctx = CallContext::for_user(CurrentUser::new(7, 1, vec!["dept".into()]));
    let repo: Repository<Notice> = state.repository_for(ctx);
    let mut titles: Vec<String> = repo
        .find_list(Filter::All)
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.title)
        .collect();
    titles.sort();
    assert_eq!(titles, vec!["a", "c", "d", "e"]);

    let created = repo.insert_one(Notice::new("mine")).await.unwrap();
    assert_eq!(created.audit.create_by, 7);
    assert_eq!(created.audit.create_dept, 1);
    assert_eq!(Notice::TABLE, "sys_notice");
}

#[tokio::test]
async fn test_busy_timeout_on_every_connection() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("busy.db");
    let db = DbService::new(&path.to_string_lossy(), 2)
        .await
        .expect("open database");

    let mut first = db.pool.acquire().await.unwrap();
    let mut second = db.pool.acquire().await.unwrap();
    for conn in [&mut first, &mut second] {
        let timeout: i64 = sqlx::query_scalar("PRAGMA busy_timeout")
            .fetch_one(&mut **conn)
            .await
            .unwrap();
        assert_eq!(timeout, 5000);
    }
}
