//! Repository and collaborator trait definitions.
//!
//! All operations are async. The control plane is generic over these
//! traits so that it has no dependency on the database crate.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::KapokResult;
use crate::models::{
    audit::{AuditLogEntry, CreateAuditLogEntry},
    migration::{MigrationRecord, MigrationStatus, NewMigration},
    quota::{Quota, SetQuota},
    tenant::{IsolationLevel, NewTenant, Tenant, TenantStatus},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Control metadata
// ---------------------------------------------------------------------------

pub trait TenantRepository: Send + Sync {
    fn create(&self, input: NewTenant) -> impl Future<Output = KapokResult<Tenant>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = KapokResult<Tenant>> + Send;
    fn get_by_name(&self, name: &str) -> impl Future<Output = KapokResult<Tenant>> + Send;
    fn list(
        &self,
        status: Option<TenantStatus>,
        pagination: Pagination,
    ) -> impl Future<Output = KapokResult<PaginatedResult<Tenant>>> + Send;
    /// Every tenant in `status`, oldest first.
    fn list_by_status(
        &self,
        status: TenantStatus,
    ) -> impl Future<Output = KapokResult<Vec<Tenant>>> + Send;
    fn update_status(
        &self,
        id: Uuid,
        status: TenantStatus,
        at: DateTime<Utc>,
    ) -> impl Future<Output = KapokResult<()>> + Send;
    fn update_isolation(
        &self,
        id: Uuid,
        level: IsolationLevel,
        at: DateTime<Utc>,
    ) -> impl Future<Output = KapokResult<()>> + Send;
    /// Persist the accumulated storage counter and stamp last activity.
    fn record_storage_usage(
        &self,
        id: Uuid,
        bytes: u64,
        at: DateTime<Utc>,
    ) -> impl Future<Output = KapokResult<()>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = KapokResult<()>> + Send;
    fn list_children(&self, parent_id: Uuid)
    -> impl Future<Output = KapokResult<Vec<Tenant>>> + Send;
    fn count_children(&self, parent_id: Uuid) -> impl Future<Output = KapokResult<u64>> + Send;
    /// Rows for `ids`, in no particular order. Missing ids are skipped.
    fn list_by_ids(&self, ids: &[Uuid]) -> impl Future<Output = KapokResult<Vec<Tenant>>> + Send;
    /// Tenants whose path starts with `path` followed by a separator.
    fn list_descendants(&self, path: &str)
    -> impl Future<Output = KapokResult<Vec<Tenant>>> + Send;
}

pub trait MigrationRepository: Send + Sync {
    /// Insert a record in `pending`.
    fn create(
        &self,
        input: NewMigration,
    ) -> impl Future<Output = KapokResult<MigrationRecord>> + Send;
    fn get(&self, id: Uuid) -> impl Future<Output = KapokResult<MigrationRecord>> + Send;
    fn update_status(
        &self,
        id: Uuid,
        status: MigrationStatus,
    ) -> impl Future<Output = KapokResult<()>> + Send;
    /// Mark `failed` and record the error message.
    fn fail(&self, id: Uuid, message: &str) -> impl Future<Output = KapokResult<()>> + Send;
    /// Mark `completed` and stamp completion and rollback deadline.
    fn complete(
        &self,
        id: Uuid,
        completed_at: DateTime<Utc>,
        rollback_before: DateTime<Utc>,
    ) -> impl Future<Output = KapokResult<()>> + Send;
    /// A tenant's migrations, newest first.
    fn list_by_tenant(
        &self,
        tenant_id: Uuid,
    ) -> impl Future<Output = KapokResult<Vec<MigrationRecord>>> + Send;
}

pub trait QuotaRepository: Send + Sync {
    fn upsert(
        &self,
        input: SetQuota,
        at: DateTime<Utc>,
    ) -> impl Future<Output = KapokResult<Quota>> + Send;
    /// Fails with `NotFound` when the tenant has no explicit quota.
    fn get(&self, tenant_id: Uuid) -> impl Future<Output = KapokResult<Quota>> + Send;
}

pub trait AuditRepository: Send + Sync {
    fn record(
        &self,
        input: CreateAuditLogEntry,
    ) -> impl Future<Output = KapokResult<AuditLogEntry>> + Send;
    fn list_by_tenant(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = KapokResult<PaginatedResult<AuditLogEntry>>> + Send;
}

/// Best-effort live-activity query against the data plane.
pub trait ActivityProbe: Send + Sync {
    fn active_connections(&self, schema_name: &str)
    -> impl Future<Output = KapokResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Physical storage
// ---------------------------------------------------------------------------

/// Schema DDL against one database.
///
/// Implementations must reject names that fail
/// [`is_valid_schema_name`](crate::models::tenant::is_valid_schema_name)
/// before issuing any statement.
pub trait SchemaManager: Send + Sync {
    fn create_schema(&self, name: &str) -> impl Future<Output = KapokResult<()>> + Send;
    fn drop_schema(&self, name: &str) -> impl Future<Output = KapokResult<()>> + Send;
    fn schema_exists(&self, name: &str) -> impl Future<Output = KapokResult<bool>> + Send;
}

/// A handle to one database that can be pooled per tenant.
pub trait TenantConnection: SchemaManager + Clone + 'static {
    fn close(&self) -> impl Future<Output = KapokResult<()>> + Send;
}

/// Server-level administration: the shared database plus dedicated
/// per-tenant databases.
pub trait DatabaseAdmin: Send + Sync + 'static {
    type Connection: TenantConnection;

    /// Connection to the shared database holding tenant schemas.
    fn shared(&self) -> &Self::Connection;
    fn create_database(&self, name: &str) -> impl Future<Output = KapokResult<()>> + Send;
    fn drop_database(&self, name: &str) -> impl Future<Output = KapokResult<()>> + Send;
    /// Open a new connection bound to the dedicated database `name`.
    fn connect(&self, name: &str)
    -> impl Future<Output = KapokResult<Self::Connection>> + Send;
}
