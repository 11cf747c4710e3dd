//! Tenant registry: metadata lifecycle and initial provisioning.

use std::sync::Arc;

use kapok_core::clock::Clock;
use kapok_core::error::{KapokError, KapokResult};
use kapok_core::models::audit::{
    ACTION_CREATE, ACTION_CREATE_CHILD, ACTION_DELETE, ACTION_HARD_DELETE, tenant_resource,
};
use kapok_core::models::tenant::{
    HierarchyLevel, IsolationLevel, NewTenant, Tenant, TenantStatus, child_path,
    generate_schema_name, root_path, slugify, validate_name,
};
use kapok_core::repository::{
    AuditRepository, DatabaseAdmin, PaginatedResult, Pagination, QuotaRepository,
    TenantRepository,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audit;
use crate::hierarchy::check_depth;
use crate::isolation::StrategyRegistry;
use crate::quota::QuotaManager;

pub struct Provisioner<T, Q, A, D>
where
    T: TenantRepository,
    Q: QuotaRepository,
    A: AuditRepository,
    D: DatabaseAdmin,
{
    tenants: T,
    audit: A,
    quotas: Arc<QuotaManager<Q, T>>,
    strategies: Arc<StrategyRegistry<D>>,
    clock: Arc<dyn Clock>,
    default_tier: String,
}

impl<T, Q, A, D> Provisioner<T, Q, A, D>
where
    T: TenantRepository,
    Q: QuotaRepository,
    A: AuditRepository,
    D: DatabaseAdmin,
{
    pub fn new(
        tenants: T,
        audit: A,
        quotas: Arc<QuotaManager<Q, T>>,
        strategies: Arc<StrategyRegistry<D>>,
        clock: Arc<dyn Clock>,
        default_tier: impl Into<String>,
    ) -> Self {
        Self {
            tenants,
            audit,
            quotas,
            strategies,
            clock,
            default_tier: default_tier.into(),
        }
    }

    /// Create a root (organization) tenant on schema isolation.
    pub async fn create_tenant(&self, name: &str) -> KapokResult<Tenant> {
        validate_name(name)?;

        let id = Uuid::new_v4();
        let input = NewTenant {
            id,
            name: name.to_string(),
            slug: slugify(name),
            schema_name: generate_schema_name(&id),
            status: TenantStatus::Provisioning,
            isolation_level: IsolationLevel::Schema,
            parent_id: None,
            hierarchy_level: HierarchyLevel::Organization,
            path: root_path(&id),
            tier: self.default_tier.clone(),
            created_at: self.clock.now(),
        };

        let tenant = self.provision(input).await?;
        self.record_audit(tenant.id, ACTION_CREATE, tenant_resource(&tenant.id))
            .await;
        Ok(tenant)
    }

    /// Create a tenant one level below `parent_id`.
    ///
    /// Depth and child quota are checked before anything is written. The
    /// child inherits the parent's isolation level and tier.
    pub async fn create_child_tenant(&self, parent_id: Uuid, name: &str) -> KapokResult<Tenant> {
        validate_name(name)?;

        let parent = self.tenants.get_by_id(parent_id).await?;
        if parent.status == TenantStatus::Deleted {
            return Err(KapokError::validation(format!(
                "parent tenant {parent_id} is deleted"
            )));
        }
        check_depth(&parent)?;
        self.quotas.check_child_quota(parent_id).await?;

        let level = parent.hierarchy_level.child().ok_or_else(|| {
            KapokError::validation(format!(
                "{} tenants cannot have children",
                parent.hierarchy_level
            ))
        })?;

        let id = Uuid::new_v4();
        let input = NewTenant {
            id,
            name: name.to_string(),
            slug: slugify(name),
            schema_name: generate_schema_name(&id),
            status: TenantStatus::Provisioning,
            isolation_level: parent.isolation_level,
            parent_id: Some(parent_id),
            hierarchy_level: level,
            path: child_path(&parent.path, &id),
            tier: parent.tier.clone(),
            created_at: self.clock.now(),
        };

        let tenant = self.provision(input).await?;
        self.record_audit(
            tenant.id,
            ACTION_CREATE_CHILD,
            format!("parent:{parent_id},{}", tenant_resource(&tenant.id)),
        )
        .await;
        Ok(tenant)
    }

    /// Insert the metadata row, provision storage and activate.
    ///
    /// DDL is not transactional, so a provisioning failure is compensated
    /// by deleting the row that was just inserted.
    async fn provision(&self, input: NewTenant) -> KapokResult<Tenant> {
        let strategy = self.strategies.resolve(input.isolation_level)?;

        // 1. Metadata row in `provisioning`.
        let mut tenant = self.tenants.create(input).await?;
        info!(
            tenant_id = %tenant.id,
            name = %tenant.name,
            isolation = %tenant.isolation_level,
            "Tenant row created, provisioning storage"
        );

        // 2. Physical storage.
        if let Err(e) = strategy.provision(&tenant).await {
            error!(tenant_id = %tenant.id, error = %e, "Provisioning failed, removing tenant row");
            if let Err(cleanup) = self.tenants.delete(tenant.id).await {
                error!(tenant_id = %tenant.id, error = %cleanup, "Failed to remove tenant row after provisioning failure");
            }
            return Err(e);
        }

        // 3. Activate. The storage exists, so a failed flip is not fatal.
        let now = self.clock.now();
        match self
            .tenants
            .update_status(tenant.id, TenantStatus::Active, now)
            .await
        {
            Ok(()) => {
                tenant.status = TenantStatus::Active;
                tenant.updated_at = now;
            }
            Err(e) => {
                warn!(tenant_id = %tenant.id, error = %e, "Failed to activate tenant");
            }
        }

        info!(tenant_id = %tenant.id, schema = %tenant.schema_name, "Tenant provisioned");
        Ok(tenant)
    }

    pub async fn list_tenants(
        &self,
        status: Option<TenantStatus>,
        pagination: Pagination,
    ) -> KapokResult<PaginatedResult<Tenant>> {
        self.tenants.list(status, pagination).await
    }

    pub async fn get_tenant_by_id(&self, id: Uuid) -> KapokResult<Tenant> {
        self.tenants.get_by_id(id).await
    }

    pub async fn get_tenant_by_name(&self, name: &str) -> KapokResult<Tenant> {
        self.tenants.get_by_name(name).await
    }

    /// Soft delete: flip status, keep storage.
    pub async fn delete_tenant(&self, id: Uuid) -> KapokResult<()> {
        self.tenants.get_by_id(id).await?;
        self.tenants
            .update_status(id, TenantStatus::Deleted, self.clock.now())
            .await?;

        info!(tenant_id = %id, "Tenant soft-deleted");
        self.record_audit(id, ACTION_DELETE, tenant_resource(&id))
            .await;
        Ok(())
    }

    /// Drop all of the tenant's storage, then its metadata row. Irreversible.
    ///
    /// If the row delete fails after the storage is gone the storage stays
    /// dropped and the error is returned.
    pub async fn hard_delete_tenant(&self, id: Uuid) -> KapokResult<()> {
        let tenant = self.tenants.get_by_id(id).await?;

        self.strategies.deprovision_all(&tenant).await?;

        if let Err(e) = self.tenants.delete(id).await {
            error!(tenant_id = %id, schema = %tenant.schema_name, error = %e, "Storage dropped but tenant row remains");
            return Err(e);
        }

        warn!(tenant_id = %id, schema = %tenant.schema_name, "Tenant hard-deleted");
        self.record_audit(id, ACTION_HARD_DELETE, tenant_resource(&id))
            .await;
        Ok(())
    }

    /// Persist the accumulated storage counter and stamp last activity.
    pub async fn record_storage_usage(&self, id: Uuid, bytes: u64) -> KapokResult<()> {
        self.tenants
            .record_storage_usage(id, bytes, self.clock.now())
            .await
    }

    async fn record_audit(&self, tenant_id: Uuid, action: &str, resource: String) {
        audit::record(&self.audit, self.clock.as_ref(), tenant_id, action, resource).await;
    }
}
