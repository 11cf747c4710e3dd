//! Integration tests for the tenant repository using in-memory
//! SurrealDB.

use chrono::{Duration, Utc};
use kapok_core::error::KapokError;
use kapok_core::models::tenant::{
    HierarchyLevel, IsolationLevel, NewTenant, TenantStatus, child_path, generate_schema_name,
    root_path, slugify,
};
use kapok_core::repository::{Pagination, TenantRepository};
use kapok_db::repository::SurrealTenantRepository;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> SurrealTenantRepository<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    kapok_db::run_migrations(&db).await.unwrap();
    SurrealTenantRepository::new(db)
}

fn new_tenant(name: &str, parent: Option<(Uuid, &str)>) -> NewTenant {
    let id = Uuid::new_v4();
    let (parent_id, path, level) = match parent {
        Some((pid, ppath)) => (Some(pid), child_path(ppath, &id), HierarchyLevel::Project),
        None => (None, root_path(&id), HierarchyLevel::Organization),
    };
    NewTenant {
        id,
        name: name.into(),
        slug: slugify(name),
        schema_name: generate_schema_name(&id),
        status: TenantStatus::Provisioning,
        isolation_level: IsolationLevel::Schema,
        parent_id,
        hierarchy_level: level,
        path,
        tier: "standard".into(),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn create_and_get_tenant() {
    let repo = setup().await;
    let input = new_tenant("acme", None);
    let id = input.id;

    let tenant = repo.create(input).await.unwrap();
    assert_eq!(tenant.id, id);
    assert_eq!(tenant.status, TenantStatus::Provisioning);
    assert_eq!(tenant.isolation_level, IsolationLevel::Schema);
    assert_eq!(tenant.storage_used_bytes, 0);
    assert!(tenant.parent_id.is_none());

    let fetched = repo.get_by_id(id).await.unwrap();
    assert_eq!(fetched.name, "acme");
    assert_eq!(fetched.schema_name, generate_schema_name(&id));

    let by_name = repo.get_by_name("acme").await.unwrap();
    assert_eq!(by_name.id, id);
}

#[tokio::test]
async fn missing_tenant_is_not_found() {
    let repo = setup().await;
    assert!(repo.get_by_id(Uuid::new_v4()).await.unwrap_err().is_not_found());
    assert!(repo.get_by_name("nobody").await.unwrap_err().is_not_found());
    assert!(
        repo.update_status(Uuid::new_v4(), TenantStatus::Active, Utc::now())
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn duplicate_names_are_rejected() {
    let repo = setup().await;
    repo.create(new_tenant("acme", None)).await.unwrap();
    let err = repo.create(new_tenant("acme", None)).await.unwrap_err();
    assert!(matches!(err, KapokError::AlreadyExists { .. }));
}

#[tokio::test]
async fn status_isolation_and_storage_updates() {
    let repo = setup().await;
    let tenant = repo.create(new_tenant("acme", None)).await.unwrap();
    let later = Utc::now() + Duration::minutes(5);

    repo.update_status(tenant.id, TenantStatus::Active, later)
        .await
        .unwrap();
    repo.update_isolation(tenant.id, IsolationLevel::Database, later)
        .await
        .unwrap();
    repo.record_storage_usage(tenant.id, 4096, later)
        .await
        .unwrap();

    let fetched = repo.get_by_id(tenant.id).await.unwrap();
    assert_eq!(fetched.status, TenantStatus::Active);
    assert_eq!(fetched.isolation_level, IsolationLevel::Database);
    assert_eq!(fetched.storage_used_bytes, 4096);
    assert!(fetched.last_activity.is_some());
    assert!(fetched.updated_at > fetched.created_at);
}

#[tokio::test]
async fn list_filters_by_status_and_paginates() {
    let repo = setup().await;
    for name in ["alpha", "bravo", "charlie"] {
        let t = repo.create(new_tenant(name, None)).await.unwrap();
        if name != "charlie" {
            repo.update_status(t.id, TenantStatus::Active, Utc::now())
                .await
                .unwrap();
        }
    }

    let all = repo.list(None, Pagination::default()).await.unwrap();
    assert_eq!(all.total, 3);
    assert_eq!(all.items.len(), 3);

    let active = repo
        .list(Some(TenantStatus::Active), Pagination::default())
        .await
        .unwrap();
    assert_eq!(active.total, 2);
    assert!(active.items.iter().all(|t| t.status == TenantStatus::Active));

    let page = repo
        .list(None, Pagination { offset: 2, limit: 2 })
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 1);

    let provisioning = repo
        .list_by_status(TenantStatus::Provisioning)
        .await
        .unwrap();
    assert_eq!(provisioning.len(), 1);
    assert_eq!(provisioning[0].name, "charlie");
}

#[tokio::test]
async fn hierarchy_queries() {
    let repo = setup().await;
    let root = repo.create(new_tenant("root-org", None)).await.unwrap();
    let a = repo
        .create(new_tenant("project-a", Some((root.id, &root.path))))
        .await
        .unwrap();
    let b = repo
        .create(new_tenant("project-b", Some((root.id, &root.path))))
        .await
        .unwrap();
    let team = repo
        .create(new_tenant("team-a1", Some((a.id, &a.path))))
        .await
        .unwrap();
    let other = repo.create(new_tenant("other-org", None)).await.unwrap();

    let children = repo.list_children(root.id).await.unwrap();
    let mut child_ids: Vec<_> = children.iter().map(|t| t.id).collect();
    child_ids.sort();
    let mut expected = vec![a.id, b.id];
    expected.sort();
    assert_eq!(child_ids, expected);
    assert_eq!(repo.count_children(root.id).await.unwrap(), 2);
    assert_eq!(repo.count_children(other.id).await.unwrap(), 0);

    let descendants = repo.list_descendants(&root.path).await.unwrap();
    assert_eq!(descendants.len(), 3);
    assert!(descendants.iter().any(|t| t.id == team.id));
    assert!(descendants.iter().all(|t| t.id != root.id));

    let fetched = repo.list_by_ids(&[root.id, team.id]).await.unwrap();
    assert_eq!(fetched.len(), 2);
    assert!(repo.list_by_ids(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_removes_the_row() {
    let repo = setup().await;
    let tenant = repo.create(new_tenant("acme", None)).await.unwrap();
    repo.delete(tenant.id).await.unwrap();
    assert!(repo.get_by_id(tenant.id).await.unwrap_err().is_not_found());
}
