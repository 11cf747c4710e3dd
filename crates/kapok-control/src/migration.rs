//! Isolation-level migrations.
//!
//! A migration runs `pending → replicating → verifying → cutover →
//! completed`. Any phase failure marks the record `failed` and returns the
//! tenant to `active` without retracting storage the target strategy
//! already created. A completed migration can be rolled back within the
//! rollback window; rollback only flips the tenant's isolation pointer.

use std::sync::Arc;

use async_trait::async_trait;
use kapok_core::clock::Clock;
use kapok_core::error::{KapokError, KapokResult};
use kapok_core::models::audit::{ACTION_MIGRATE, ACTION_ROLLBACK, tenant_resource};
use kapok_core::models::migration::{
    MigrationRecord, MigrationStatus, NewMigration, rollback_window,
};
use kapok_core::models::tenant::{IsolationLevel, Tenant, TenantStatus};
use kapok_core::repository::{
    AuditRepository, DatabaseAdmin, MigrationRepository, TenantRepository,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audit;
use crate::isolation::StrategyRegistry;

/// Checks run against source and target during the `verifying` phase.
///
/// An error fails the migration.
#[async_trait]
pub trait MigrationVerifier: Send + Sync {
    async fn verify(&self, tenant: &Tenant, record: &MigrationRecord) -> KapokResult<()>;
}

/// Verifier that accepts every migration.
pub struct SkipVerification;

#[async_trait]
impl MigrationVerifier for SkipVerification {
    async fn verify(&self, _tenant: &Tenant, _record: &MigrationRecord) -> KapokResult<()> {
        Ok(())
    }
}

pub struct MigrationManager<T, M, A, D>
where
    T: TenantRepository,
    M: MigrationRepository,
    A: AuditRepository,
    D: DatabaseAdmin,
{
    tenants: T,
    migrations: M,
    audit: A,
    strategies: Arc<StrategyRegistry<D>>,
    verifier: Arc<dyn MigrationVerifier>,
    clock: Arc<dyn Clock>,
}

impl<T, M, A, D> MigrationManager<T, M, A, D>
where
    T: TenantRepository,
    M: MigrationRepository,
    A: AuditRepository,
    D: DatabaseAdmin,
{
    pub fn new(
        tenants: T,
        migrations: M,
        audit: A,
        strategies: Arc<StrategyRegistry<D>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tenants,
            migrations,
            audit,
            strategies,
            verifier: Arc::new(SkipVerification),
            clock,
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn MigrationVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Run a whole migration between two named isolation levels and
    /// return the completed record.
    pub async fn migrate(
        &self,
        tenant_id: Uuid,
        from: &str,
        to: &str,
    ) -> KapokResult<MigrationRecord> {
        let from = self.strategies.get(from)?.level();
        let to = self.strategies.get(to)?.level();

        let record = self.begin(tenant_id, from, to).await?;
        self.run(record).await
    }

    /// Validate the request, insert a `pending` record and mark the
    /// tenant `migrating`. Nothing is provisioned yet.
    pub async fn begin(
        &self,
        tenant_id: Uuid,
        from: IsolationLevel,
        to: IsolationLevel,
    ) -> KapokResult<MigrationRecord> {
        self.strategies.resolve(from)?;
        self.strategies.resolve(to)?;
        if from == to {
            return Err(KapokError::validation(format!(
                "tenant {tenant_id} is already on {to} isolation"
            )));
        }

        let tenant = self.tenants.get_by_id(tenant_id).await?;
        if tenant.isolation_level != from {
            return Err(KapokError::IsolationMismatch {
                expected: from.to_string(),
                actual: tenant.isolation_level.to_string(),
            });
        }
        if tenant.status != TenantStatus::Active {
            return Err(KapokError::validation(format!(
                "tenant {tenant_id} is {}, migrations require an active tenant",
                tenant.status
            )));
        }

        let record = self
            .migrations
            .create(NewMigration {
                id: Uuid::new_v4(),
                tenant_id,
                from_isolation: from,
                to_isolation: to,
                started_at: self.clock.now(),
            })
            .await?;

        if let Err(e) = self
            .tenants
            .update_status(tenant_id, TenantStatus::Migrating, self.clock.now())
            .await
        {
            return Err(self.abort(&record, e).await);
        }

        info!(
            migration_id = %record.id,
            tenant_id = %tenant_id,
            from = %from,
            to = %to,
            "Migration started"
        );
        Ok(record)
    }

    /// Drive a `pending` record through the remaining phases.
    pub async fn run(&self, mut record: MigrationRecord) -> KapokResult<MigrationRecord> {
        if let Err(e) = self.execute(&mut record).await {
            return Err(self.abort(&record, e).await);
        }

        info!(migration_id = %record.id, tenant_id = %record.tenant_id, "Migration completed");
        audit::record(
            &self.audit,
            self.clock.as_ref(),
            record.tenant_id,
            ACTION_MIGRATE,
            format!(
                "{},from:{},to:{}",
                tenant_resource(&record.tenant_id),
                record.from_isolation,
                record.to_isolation
            ),
        )
        .await;

        self.migrations.get(record.id).await
    }

    async fn execute(&self, record: &mut MigrationRecord) -> KapokResult<()> {
        let target = self.strategies.resolve(record.to_isolation)?;
        let tenant = self.tenants.get_by_id(record.tenant_id).await?;

        // Replicating: create the target storage.
        self.advance(record, MigrationStatus::Replicating).await?;
        target.provision(&tenant).await?;

        // Verifying
        self.advance(record, MigrationStatus::Verifying).await?;
        self.verifier.verify(&tenant, record).await?;

        // Cutover: point the tenant at the new storage.
        self.advance(record, MigrationStatus::Cutover).await?;
        self.tenants
            .update_isolation(record.tenant_id, record.to_isolation, self.clock.now())
            .await?;

        if !record.status.can_transition_to(MigrationStatus::Completed) {
            return Err(invalid_transition(record, MigrationStatus::Completed));
        }
        let completed_at = self.clock.now();
        self.migrations
            .complete(record.id, completed_at, completed_at + rollback_window())
            .await?;
        record.status = MigrationStatus::Completed;

        self.reactivate(record.tenant_id).await;
        Ok(())
    }

    async fn advance(&self, record: &mut MigrationRecord, next: MigrationStatus) -> KapokResult<()> {
        if !record.status.can_transition_to(next) {
            return Err(invalid_transition(record, next));
        }
        self.migrations.update_status(record.id, next).await?;
        record.status = next;
        info!(migration_id = %record.id, tenant_id = %record.tenant_id, phase = %next, "Migration phase");
        Ok(())
    }

    /// Mark the record failed and return the tenant to `active`. Returns
    /// the error that caused the failure.
    async fn abort(&self, record: &MigrationRecord, cause: KapokError) -> KapokError {
        error!(
            migration_id = %record.id,
            tenant_id = %record.tenant_id,
            phase = %record.status,
            error = %cause,
            "Migration failed"
        );
        if record.status.can_transition_to(MigrationStatus::Failed) {
            if let Err(e) = self.migrations.fail(record.id, &cause.to_string()).await {
                error!(migration_id = %record.id, error = %e, "Failed to mark migration failed");
            }
        }
        self.reactivate(record.tenant_id).await;
        cause
    }

    async fn reactivate(&self, tenant_id: Uuid) {
        if let Err(e) = self
            .tenants
            .update_status(tenant_id, TenantStatus::Active, self.clock.now())
            .await
        {
            warn!(tenant_id = %tenant_id, error = %e, "Failed to reset tenant status to active");
        }
    }

    /// Not found is reported as `NotFound`, distinct from other failures.
    pub async fn get_migration(&self, id: Uuid) -> KapokResult<MigrationRecord> {
        self.migrations.get(id).await
    }

    /// A tenant's migrations, newest first.
    pub async fn list_migrations(&self, tenant_id: Uuid) -> KapokResult<Vec<MigrationRecord>> {
        self.migrations.list_by_tenant(tenant_id).await
    }

    /// Point the tenant back at its pre-migration isolation level.
    ///
    /// Allowed only for a `completed` record strictly before its rollback
    /// deadline. Storage created by the migration is left in place.
    pub async fn rollback(&self, migration_id: Uuid) -> KapokResult<MigrationRecord> {
        let record = self.migrations.get(migration_id).await?;
        record.check_rollback(self.clock.now())?;

        self.tenants
            .update_isolation(record.tenant_id, record.from_isolation, self.clock.now())
            .await?;
        self.migrations
            .update_status(record.id, MigrationStatus::RolledBack)
            .await?;
        self.reactivate(record.tenant_id).await;

        warn!(
            migration_id = %record.id,
            tenant_id = %record.tenant_id,
            isolation = %record.from_isolation,
            "Migration rolled back"
        );
        audit::record(
            &self.audit,
            self.clock.as_ref(),
            record.tenant_id,
            ACTION_ROLLBACK,
            format!("{},migration:{}", tenant_resource(&record.tenant_id), record.id),
        )
        .await;

        self.migrations.get(record.id).await
    }
}

fn invalid_transition(record: &MigrationRecord, next: MigrationStatus) -> KapokError {
    KapokError::InvalidMigrationState {
        id: record.id.to_string(),
        status: record.status.to_string(),
        required: format!("a phase that may move to {next}"),
    }
}
