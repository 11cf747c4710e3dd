//! Isolation migrations: phases, failures and the rollback window.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use chrono::Duration;
use common::Harness;
use kapok_control::{ControlConfig, MigrationVerifier};
use kapok_core::clock::Clock;
use kapok_core::error::{ErrorKind, KapokError, KapokResult};
use kapok_core::models::audit::{ACTION_MIGRATE, ACTION_ROLLBACK};
use kapok_core::models::migration::{MigrationRecord, MigrationStatus, rollback_window};
use kapok_core::models::tenant::{IsolationLevel, Tenant, TenantStatus, database_name};
use kapok_core::repository::SchemaManager;
use uuid::Uuid;

async fn migrated(h: &Harness) -> (Tenant, MigrationRecord) {
    let tenant = h.plane.provisioner.create_tenant("acme").await.unwrap();
    let record = h
        .plane
        .migrations
        .migrate(tenant.id, "schema", "database")
        .await
        .unwrap();
    (tenant, record)
}

#[tokio::test]
async fn schema_to_database_completes() {
    let h = Harness::new().await;
    let (tenant, record) = migrated(&h).await;

    assert_eq!(record.status, MigrationStatus::Completed);
    assert_eq!(record.tenant_id, tenant.id);
    assert_eq!(record.from_isolation, IsolationLevel::Schema);
    assert_eq!(record.to_isolation, IsolationLevel::Database);
    let completed_at = record.completed_at.unwrap();
    assert_eq!(completed_at, h.clock.now());
    assert_eq!(record.rollback_before, Some(completed_at + rollback_window()));
    assert!(record.error_message.is_none());

    let stored = h.plane.provisioner.get_tenant_by_id(tenant.id).await.unwrap();
    assert_eq!(stored.isolation_level, IsolationLevel::Database);
    assert_eq!(stored.status, TenantStatus::Active);

    // The dedicated database is pooled and hosts the tenant schema.
    assert_eq!(h.plane.pools.count(), 1);
    let conn = h.plane.strategies.connection(&stored).unwrap();
    assert!(conn.schema_exists(&stored.schema_name).await.unwrap());

    assert_eq!(h.audit_actions(tenant.id).await[0], ACTION_MIGRATE);

    let history = h.plane.migrations.list_migrations(tenant.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, record.id);
}

#[tokio::test]
async fn mismatched_source_fails_without_a_record() {
    let h = Harness::new().await;
    let (tenant, _) = migrated(&h).await;

    let err = h
        .plane
        .migrations
        .migrate(tenant.id, "schema", "database")
        .await
        .unwrap_err();
    assert!(matches!(err, KapokError::IsolationMismatch { .. }));
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    assert_eq!(h.plane.migrations.list_migrations(tenant.id).await.unwrap().len(), 1);
    assert_eq!(h.plane.pools.count(), 1);
}

#[tokio::test]
async fn unknown_isolation_names_fail_immediately() {
    let h = Harness::new().await;
    let tenant = h.plane.provisioner.create_tenant("acme").await.unwrap();

    for (from, to) in [("schema", "cluster"), ("shared", "database")] {
        let err = h
            .plane
            .migrations
            .migrate(tenant.id, from, to)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput, "{from} -> {to}");
    }
    assert!(h.plane.migrations.list_migrations(tenant.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_tenant_and_migration_are_not_found() {
    let h = Harness::new().await;

    let err = h
        .plane
        .migrations
        .migrate(Uuid::new_v4(), "schema", "database")
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = h.plane.migrations.get_migration(Uuid::new_v4()).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn replication_failure_marks_failed_and_restores_tenant() {
    let h = Harness::new().await;
    let tenant = h.plane.provisioner.create_tenant("acme").await.unwrap();
    h.faults.create_database.store(true, Ordering::SeqCst);

    let err = h
        .plane
        .migrations
        .migrate(tenant.id, "schema", "database")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Infrastructure);

    let history = h.plane.migrations.list_migrations(tenant.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, MigrationStatus::Failed);
    assert!(history[0].error_message.as_deref().unwrap().contains("injected"));
    assert!(history[0].completed_at.is_none());

    let stored = h.plane.provisioner.get_tenant_by_id(tenant.id).await.unwrap();
    assert_eq!(stored.status, TenantStatus::Active);
    assert_eq!(stored.isolation_level, IsolationLevel::Schema);
    assert_eq!(h.plane.pools.count(), 0);

    // A failed migration cannot be rolled back.
    let err = h.plane.migrations.rollback(history[0].id).await.unwrap_err();
    assert!(matches!(err, KapokError::InvalidMigrationState { .. }));
}

#[tokio::test]
async fn failed_target_schema_leaves_the_database_behind() {
    let h = Harness::new().await;
    let tenant = h.plane.provisioner.create_tenant("acme").await.unwrap();
    h.faults.create_schema.store(true, Ordering::SeqCst);

    h.plane
        .migrations
        .migrate(tenant.id, "schema", "database")
        .await
        .unwrap_err();

    // The dedicated database was created and its connection pooled before
    // the schema step failed; neither is retracted.
    assert_eq!(h.plane.pools.count(), 1);
    let history = h.plane.migrations.list_migrations(tenant.id).await.unwrap();
    assert_eq!(history[0].status, MigrationStatus::Failed);

    let stored = h.plane.provisioner.get_tenant_by_id(tenant.id).await.unwrap();
    assert_eq!(stored.isolation_level, IsolationLevel::Schema);
}

struct RejectingVerifier;

#[async_trait]
impl MigrationVerifier for RejectingVerifier {
    async fn verify(&self, _tenant: &Tenant, _record: &MigrationRecord) -> KapokResult<()> {
        Err(KapokError::Internal("row counts differ".into()))
    }
}

#[tokio::test]
async fn verifier_rejection_fails_before_cutover() {
    let h = Harness::with(ControlConfig::default(), Arc::new(RejectingVerifier)).await;
    let tenant = h.plane.provisioner.create_tenant("acme").await.unwrap();

    let err = h
        .plane
        .migrations
        .migrate(tenant.id, "schema", "database")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("row counts differ"));

    let history = h.plane.migrations.list_migrations(tenant.id).await.unwrap();
    assert_eq!(history[0].status, MigrationStatus::Failed);
    let stored = h.plane.provisioner.get_tenant_by_id(tenant.id).await.unwrap();
    assert_eq!(stored.isolation_level, IsolationLevel::Schema);
    assert_eq!(stored.status, TenantStatus::Active);
}

#[tokio::test]
async fn rollback_inside_the_window_reverts_isolation() {
    let h = Harness::new().await;
    let (tenant, record) = migrated(&h).await;

    h.clock.advance(Duration::hours(23));
    let rolled = h.plane.migrations.rollback(record.id).await.unwrap();
    assert_eq!(rolled.status, MigrationStatus::RolledBack);

    let stored = h.plane.provisioner.get_tenant_by_id(tenant.id).await.unwrap();
    assert_eq!(stored.isolation_level, IsolationLevel::Schema);
    assert_eq!(stored.status, TenantStatus::Active);
    assert_eq!(h.audit_actions(tenant.id).await[0], ACTION_ROLLBACK);

    // Only the pointer moves; the pooled database stays.
    assert_eq!(h.plane.pools.count(), 1);

    // A second rollback is refused.
    let err = h.plane.migrations.rollback(record.id).await.unwrap_err();
    assert!(matches!(err, KapokError::InvalidMigrationState { .. }));
}

#[tokio::test]
async fn rollback_after_the_window_is_refused() {
    let h = Harness::new().await;
    let (tenant, record) = migrated(&h).await;

    h.clock.advance(Duration::hours(25));
    let err = h.plane.migrations.rollback(record.id).await.unwrap_err();
    assert!(matches!(err, KapokError::RollbackWindowExpired { .. }));

    let stored = h.plane.provisioner.get_tenant_by_id(tenant.id).await.unwrap();
    assert_eq!(stored.isolation_level, IsolationLevel::Database);
}

#[tokio::test]
async fn rollback_at_the_deadline_is_refused() {
    let h = Harness::new().await;
    let (_, record) = migrated(&h).await;

    h.clock.advance(rollback_window());
    assert!(matches!(
        h.plane.migrations.rollback(record.id).await,
        Err(KapokError::RollbackWindowExpired { .. })
    ));
}

#[tokio::test]
async fn children_of_migrated_tenants_get_dedicated_databases() {
    let h = Harness::new().await;
    let (org, _) = migrated(&h).await;

    let child = h
        .plane
        .provisioner
        .create_child_tenant(org.id, "acme-web")
        .await
        .unwrap();
    assert_eq!(child.isolation_level, IsolationLevel::Database);
    assert_eq!(h.plane.pools.count(), 2);

    h.plane.provisioner.hard_delete_tenant(child.id).await.unwrap();
    assert_eq!(h.plane.pools.count(), 1);
}

#[tokio::test]
async fn hard_delete_after_migration_drops_shared_schema_too() {
    let h = Harness::new().await;
    let (tenant, _) = migrated(&h).await;
    assert!(h.schema_exists(&tenant.schema_name).await);

    h.plane.provisioner.hard_delete_tenant(tenant.id).await.unwrap();

    assert!(!h.schema_exists(&tenant.schema_name).await);
    assert_eq!(h.plane.pools.count(), 0);
    assert_eq!(h.dropped_databases(), vec![database_name(&tenant.id)]);
    assert!(
        h.plane
            .provisioner
            .get_tenant_by_id(tenant.id)
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn hard_delete_after_rollback_releases_dedicated_database() {
    let h = Harness::new().await;
    let (tenant, record) = migrated(&h).await;

    h.clock.advance(Duration::hours(1));
    h.plane.migrations.rollback(record.id).await.unwrap();
    assert_eq!(h.plane.pools.count(), 1);

    h.plane.provisioner.hard_delete_tenant(tenant.id).await.unwrap();

    assert_eq!(h.plane.pools.count(), 0);
    assert_eq!(h.dropped_databases(), vec![database_name(&tenant.id)]);
    assert!(!h.schema_exists(&tenant.schema_name).await);
}

#[tokio::test]
async fn deleted_tenants_cannot_migrate() {
    let h = Harness::new().await;
    let tenant = h.plane.provisioner.create_tenant("acme").await.unwrap();
    h.plane.provisioner.delete_tenant(tenant.id).await.unwrap();

    let err = h
        .plane
        .migrations
        .migrate(tenant.id, "schema", "database")
        .await
        .unwrap_err();
    assert!(matches!(err, KapokError::Validation { .. }));
    assert!(h.plane.migrations.list_migrations(tenant.id).await.unwrap().is_empty());
}
