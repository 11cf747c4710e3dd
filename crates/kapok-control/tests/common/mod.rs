//! Shared harness: an in-memory store, a manual clock and an admin that
//! can be told to fail DDL.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};
use kapok_control::{
    ControlConfig, ControlPlane, MigrationVerifier, MigrationWorker, Repositories,
    SkipVerification,
};
use kapok_core::clock::Clock;
use kapok_core::error::{KapokError, KapokResult};
use kapok_core::models::migration::{MigrationRecord, MigrationStatus};
use kapok_core::models::tenant::{IsolationLevel, NewTenant, Tenant, TenantStatus};
use kapok_core::repository::{
    ActivityProbe, AuditRepository, DatabaseAdmin, PaginatedResult, Pagination, SchemaManager,
    TenantConnection, TenantRepository,
};
use uuid::Uuid;
use kapok_db::repository::{
    SurrealActivityProbe, SurrealAuditRepository, SurrealMigrationRepository,
    SurrealQuotaRepository, SurrealTenantRepository,
};
use kapok_db::{DbConfig, DbManager, SurrealAdmin, SurrealConnection};
use parking_lot::Mutex;
use surrealdb::engine::any::Any;

// -----------------------------------------------------------------------
// Clock
// -----------------------------------------------------------------------

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

// -----------------------------------------------------------------------
// Fault injection
// -----------------------------------------------------------------------

#[derive(Default)]
pub struct Faults {
    pub create_schema: AtomicBool,
    pub create_database: AtomicBool,
    /// Names passed to `drop_database`, in call order.
    pub dropped_databases: Mutex<Vec<String>>,
}

impl Faults {
    fn check(flag: &AtomicBool, what: &str) -> KapokResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(KapokError::Database(format!("injected {what} failure")));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct FaultyConnection {
    inner: SurrealConnection,
    faults: Arc<Faults>,
}

impl SchemaManager for FaultyConnection {
    async fn create_schema(&self, name: &str) -> KapokResult<()> {
        Faults::check(&self.faults.create_schema, "create schema")?;
        self.inner.create_schema(name).await
    }

    async fn drop_schema(&self, name: &str) -> KapokResult<()> {
        self.inner.drop_schema(name).await
    }

    async fn schema_exists(&self, name: &str) -> KapokResult<bool> {
        self.inner.schema_exists(name).await
    }
}

impl TenantConnection for FaultyConnection {
    async fn close(&self) -> KapokResult<()> {
        self.inner.close().await
    }
}

pub struct FaultyAdmin {
    inner: SurrealAdmin,
    shared: FaultyConnection,
    faults: Arc<Faults>,
}

impl FaultyAdmin {
    pub fn new(inner: SurrealAdmin, faults: Arc<Faults>) -> Self {
        let shared = FaultyConnection {
            inner: inner.shared().clone(),
            faults: faults.clone(),
        };
        Self {
            inner,
            shared,
            faults,
        }
    }
}

impl DatabaseAdmin for FaultyAdmin {
    type Connection = FaultyConnection;

    fn shared(&self) -> &FaultyConnection {
        &self.shared
    }

    async fn create_database(&self, name: &str) -> KapokResult<()> {
        Faults::check(&self.faults.create_database, "create database")?;
        self.inner.create_database(name).await
    }

    async fn drop_database(&self, name: &str) -> KapokResult<()> {
        self.inner.drop_database(name).await?;
        self.faults.dropped_databases.lock().push(name.to_string());
        Ok(())
    }

    async fn connect(&self, name: &str) -> KapokResult<FaultyConnection> {
        Ok(FaultyConnection {
            inner: self.inner.connect(name).await?,
            faults: self.faults.clone(),
        })
    }
}

// -----------------------------------------------------------------------
// Unreadable tenants
// -----------------------------------------------------------------------

/// Tenants whose row lookups fail and schemas whose activity probe fails.
#[derive(Default)]
pub struct Unreadable {
    pub tenants: Mutex<HashSet<Uuid>>,
    pub schemas: Mutex<HashSet<String>>,
}

impl Unreadable {
    fn check_tenant(&self, id: Uuid) -> KapokResult<()> {
        if self.tenants.lock().contains(&id) {
            return Err(KapokError::Database(format!("injected read failure for {id}")));
        }
        Ok(())
    }
}

/// Tenant repository whose `get_by_id` fails for chosen tenants. Listing
/// queries still see every row.
#[derive(Clone)]
pub struct FlakyTenants {
    inner: SurrealTenantRepository<Any>,
    unreadable: Arc<Unreadable>,
}

impl FlakyTenants {
    pub fn new(db: &DbManager, unreadable: Arc<Unreadable>) -> Self {
        Self {
            inner: SurrealTenantRepository::new(db.client().clone()),
            unreadable,
        }
    }
}

impl TenantRepository for FlakyTenants {
    async fn create(&self, input: NewTenant) -> KapokResult<Tenant> {
        self.inner.create(input).await
    }

    async fn get_by_id(&self, id: Uuid) -> KapokResult<Tenant> {
        self.unreadable.check_tenant(id)?;
        self.inner.get_by_id(id).await
    }

    async fn get_by_name(&self, name: &str) -> KapokResult<Tenant> {
        self.inner.get_by_name(name).await
    }

    async fn list(
        &self,
        status: Option<TenantStatus>,
        pagination: Pagination,
    ) -> KapokResult<PaginatedResult<Tenant>> {
        self.inner.list(status, pagination).await
    }

    async fn list_by_status(&self, status: TenantStatus) -> KapokResult<Vec<Tenant>> {
        self.inner.list_by_status(status).await
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: TenantStatus,
        at: DateTime<Utc>,
    ) -> KapokResult<()> {
        self.inner.update_status(id, status, at).await
    }

    async fn update_isolation(
        &self,
        id: Uuid,
        level: IsolationLevel,
        at: DateTime<Utc>,
    ) -> KapokResult<()> {
        self.inner.update_isolation(id, level, at).await
    }

    async fn record_storage_usage(&self, id: Uuid, bytes: u64, at: DateTime<Utc>) -> KapokResult<()> {
        self.inner.record_storage_usage(id, bytes, at).await
    }

    async fn delete(&self, id: Uuid) -> KapokResult<()> {
        self.inner.delete(id).await
    }

    async fn list_children(&self, parent_id: Uuid) -> KapokResult<Vec<Tenant>> {
        self.inner.list_children(parent_id).await
    }

    async fn count_children(&self, parent_id: Uuid) -> KapokResult<u64> {
        self.inner.count_children(parent_id).await
    }

    async fn list_by_ids(&self, ids: &[Uuid]) -> KapokResult<Vec<Tenant>> {
        self.inner.list_by_ids(ids).await
    }

    async fn list_descendants(&self, path: &str) -> KapokResult<Vec<Tenant>> {
        self.inner.list_descendants(path).await
    }
}

/// Activity probe that fails for chosen schemas.
pub struct FlakyActivity {
    inner: SurrealActivityProbe<Any>,
    unreadable: Arc<Unreadable>,
}

impl FlakyActivity {
    pub fn new(db: &DbManager, unreadable: Arc<Unreadable>) -> Self {
        Self {
            inner: SurrealActivityProbe::new(db.client().clone()),
            unreadable,
        }
    }
}

impl ActivityProbe for FlakyActivity {
    async fn active_connections(&self, schema_name: &str) -> KapokResult<u64> {
        if self.unreadable.schemas.lock().contains(schema_name) {
            return Err(KapokError::Database(format!(
                "injected probe failure for {schema_name}"
            )));
        }
        self.inner.active_connections(schema_name).await
    }
}

// -----------------------------------------------------------------------
// Plane
// -----------------------------------------------------------------------

pub type Plane = ControlPlane<
    SurrealTenantRepository<Any>,
    SurrealMigrationRepository<Any>,
    SurrealQuotaRepository<Any>,
    SurrealAuditRepository<Any>,
    SurrealActivityProbe<Any>,
    FaultyAdmin,
>;

pub type Worker = MigrationWorker<
    SurrealTenantRepository<Any>,
    SurrealMigrationRepository<Any>,
    SurrealAuditRepository<Any>,
    FaultyAdmin,
>;

pub struct Harness {
    pub plane: Plane,
    pub worker: Option<Worker>,
    pub db: DbManager,
    pub clock: Arc<ManualClock>,
    pub faults: Arc<Faults>,
}

impl Harness {
    /// Configuration with approval off and a one hour cooldown.
    pub fn auto_config() -> ControlConfig {
        ControlConfig {
            approval_required: false,
            ..ControlConfig::default()
        }
    }

    pub async fn new() -> Self {
        Self::with(ControlConfig::default(), Arc::new(SkipVerification)).await
    }

    pub async fn with(config: ControlConfig, verifier: Arc<dyn MigrationVerifier>) -> Self {
        let db = DbManager::connect(&DbConfig::memory()).await.unwrap();
        kapok_db::run_migrations(db.client()).await.unwrap();

        let client = db.client().clone();
        let repos = Repositories {
            tenants: SurrealTenantRepository::new(client.clone()),
            migrations: SurrealMigrationRepository::new(client.clone()),
            quotas: SurrealQuotaRepository::new(client.clone()),
            audit: SurrealAuditRepository::new(client.clone()),
        };

        let faults = Arc::new(Faults::default());
        let admin = FaultyAdmin::new(db.admin(), faults.clone());
        let clock = Arc::new(ManualClock::new());

        let (plane, worker) = ControlPlane::build(
            repos,
            admin,
            SurrealActivityProbe::new(client),
            verifier,
            clock.clone(),
            config,
        );

        Self {
            plane,
            worker: Some(worker),
            db,
            clock,
            faults,
        }
    }

    /// Spawn the migration worker; the returned sender stops it.
    pub fn start_worker(&mut self) -> tokio::sync::watch::Sender<bool> {
        let (tx, rx) = tokio::sync::watch::channel(false);
        if let Some(worker) = self.worker.take() {
            tokio::spawn(worker.run(rx));
        }
        tx
    }

    pub fn dropped_databases(&self) -> Vec<String> {
        self.faults.dropped_databases.lock().clone()
    }

    pub async fn schema_exists(&self, name: &str) -> bool {
        self.db.admin().shared().schema_exists(name).await.unwrap()
    }

    /// Insert `count` active sessions for `schema_name`.
    pub async fn open_sessions(&self, schema_name: &str, count: usize) {
        for _ in 0..count {
            self.db
                .client()
                .query("CREATE tenant_session SET schema_name = $schema, state = 'active'")
                .bind(("schema", schema_name.to_string()))
                .await
                .unwrap()
                .check()
                .unwrap();
        }
    }

    /// Audit actions recorded for `tenant_id`, newest first.
    pub async fn audit_actions(&self, tenant_id: Uuid) -> Vec<String> {
        SurrealAuditRepository::new(self.db.client().clone())
            .list_by_tenant(tenant_id, Pagination::default())
            .await
            .unwrap()
            .items
            .into_iter()
            .map(|e| e.action)
            .collect()
    }

    /// Poll a migration until it reaches `status`.
    pub async fn wait_for(&self, migration_id: Uuid, status: MigrationStatus) -> MigrationRecord {
        for _ in 0..200 {
            let record = self
                .plane
                .migrations
                .get_migration(migration_id)
                .await
                .unwrap();
            if record.status == status {
                return record;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("migration {migration_id} never reached {status}");
    }
}
