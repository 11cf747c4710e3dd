//! Isolation strategies and their lookup table.
//!
//! The set of strategies is closed: each [`IsolationLevel`] has exactly
//! one variant of [`IsolationStrategy`]. The registry maps level names to
//! instances so callers holding a stored string resolve it explicitly.

use std::collections::HashMap;
use std::sync::Arc;

use kapok_core::error::{ErrorKind, KapokError, KapokResult};
use kapok_core::models::tenant::{IsolationLevel, Tenant, database_name};
use kapok_core::repository::{DatabaseAdmin, SchemaManager, TenantConnection};
use tracing::{info, warn};

use crate::pool::PoolRegistry;

/// Wrap infrastructure failures with the step that failed; input errors
/// pass through unchanged.
fn provisioning(step: &str, err: KapokError) -> KapokError {
    match err.kind() {
        ErrorKind::Infrastructure => KapokError::Provisioning(format!("{step}: {err}")),
        _ => err,
    }
}

/// A schema per tenant inside the shared database.
pub struct SchemaIsolation<D: DatabaseAdmin> {
    admin: Arc<D>,
}

impl<D: DatabaseAdmin> SchemaIsolation<D> {
    pub fn new(admin: Arc<D>) -> Self {
        Self { admin }
    }

    async fn provision(&self, tenant: &Tenant) -> KapokResult<()> {
        info!(tenant_id = %tenant.id, schema = %tenant.schema_name, "Provisioning schema isolation");
        self.admin
            .shared()
            .create_schema(&tenant.schema_name)
            .await
            .map_err(|e| provisioning("create schema", e))
    }

    async fn deprovision(&self, tenant: &Tenant) -> KapokResult<()> {
        warn!(tenant_id = %tenant.id, schema = %tenant.schema_name, "Deprovisioning schema isolation");
        self.admin
            .shared()
            .drop_schema(&tenant.schema_name)
            .await
            .map_err(|e| provisioning("drop schema", e))
    }

    fn connection(&self, tenant: &Tenant) -> KapokResult<D::Connection> {
        if tenant.isolation_level != IsolationLevel::Schema {
            return Err(KapokError::IsolationMismatch {
                expected: IsolationLevel::Schema.to_string(),
                actual: tenant.isolation_level.to_string(),
            });
        }
        Ok(self.admin.shared().clone())
    }
}

/// A dedicated database per tenant, reached through a pooled connection.
pub struct DatabaseIsolation<D: DatabaseAdmin> {
    admin: Arc<D>,
    pools: Arc<PoolRegistry<D::Connection>>,
}

impl<D: DatabaseAdmin> DatabaseIsolation<D> {
    pub fn new(admin: Arc<D>, pools: Arc<PoolRegistry<D::Connection>>) -> Self {
        Self { admin, pools }
    }

    async fn provision(&self, tenant: &Tenant) -> KapokResult<()> {
        let database = database_name(&tenant.id);
        info!(tenant_id = %tenant.id, database = %database, "Provisioning database isolation");

        self.admin
            .create_database(&database)
            .await
            .map_err(|e| provisioning("create database", e))?;

        let conn = self
            .admin
            .connect(&database)
            .await
            .map_err(|e| provisioning("connect to tenant database", e))?;

        if let Some(previous) = self.pools.set(tenant.id, conn.clone()) {
            if let Err(e) = previous.close().await {
                warn!(tenant_id = %tenant.id, error = %e, "Failed to close replaced tenant connection");
            }
        }

        conn.create_schema(&tenant.schema_name)
            .await
            .map_err(|e| provisioning("create schema in tenant database", e))?;

        info!(tenant_id = %tenant.id, database = %database, "Database isolation provisioned");
        Ok(())
    }

    async fn deprovision(&self, tenant: &Tenant) -> KapokResult<()> {
        let database = database_name(&tenant.id);
        warn!(tenant_id = %tenant.id, database = %database, "Deprovisioning database isolation");

        self.pools.remove(&tenant.id).await;
        self.admin
            .drop_database(&database)
            .await
            .map_err(|e| provisioning("drop database", e))
    }

    fn connection(&self, tenant: &Tenant) -> KapokResult<D::Connection> {
        self.pools
            .get(&tenant.id)
            .ok_or_else(|| KapokError::not_found("tenant connection", tenant.id))
    }
}

pub enum IsolationStrategy<D: DatabaseAdmin> {
    Schema(SchemaIsolation<D>),
    Database(DatabaseIsolation<D>),
}

impl<D: DatabaseAdmin> IsolationStrategy<D> {
    pub fn level(&self) -> IsolationLevel {
        match self {
            IsolationStrategy::Schema(_) => IsolationLevel::Schema,
            IsolationStrategy::Database(_) => IsolationLevel::Database,
        }
    }

    /// Create the storage backing `tenant` under this strategy.
    pub async fn provision(&self, tenant: &Tenant) -> KapokResult<()> {
        match self {
            IsolationStrategy::Schema(s) => s.provision(tenant).await,
            IsolationStrategy::Database(s) => s.provision(tenant).await,
        }
    }

    /// Tear down the storage backing `tenant` under this strategy.
    pub async fn deprovision(&self, tenant: &Tenant) -> KapokResult<()> {
        match self {
            IsolationStrategy::Schema(s) => s.deprovision(tenant).await,
            IsolationStrategy::Database(s) => s.deprovision(tenant).await,
        }
    }

    pub fn connection(&self, tenant: &Tenant) -> KapokResult<D::Connection> {
        match self {
            IsolationStrategy::Schema(s) => s.connection(tenant),
            IsolationStrategy::Database(s) => s.connection(tenant),
        }
    }
}

/// Lookup table from isolation-level name to strategy.
pub struct StrategyRegistry<D: DatabaseAdmin> {
    strategies: HashMap<IsolationLevel, IsolationStrategy<D>>,
    pools: Arc<PoolRegistry<D::Connection>>,
}

impl<D: DatabaseAdmin> StrategyRegistry<D> {
    pub fn new(pools: Arc<PoolRegistry<D::Connection>>) -> Self {
        Self {
            strategies: HashMap::new(),
            pools,
        }
    }

    /// Registry with both schema and database strategies.
    pub fn standard(admin: Arc<D>, pools: Arc<PoolRegistry<D::Connection>>) -> Self {
        let mut registry = Self::new(pools.clone());
        registry.register(IsolationStrategy::Schema(SchemaIsolation::new(admin.clone())));
        registry.register(IsolationStrategy::Database(DatabaseIsolation::new(
            admin, pools,
        )));
        registry
    }

    /// Add or replace the strategy for its level.
    pub fn register(&mut self, strategy: IsolationStrategy<D>) {
        self.strategies.insert(strategy.level(), strategy);
    }

    /// Resolve a stored isolation-level name.
    pub fn get(&self, name: &str) -> KapokResult<&IsolationStrategy<D>> {
        let level: IsolationLevel = name.parse()?;
        self.resolve(level)
    }

    pub fn resolve(&self, level: IsolationLevel) -> KapokResult<&IsolationStrategy<D>> {
        self.strategies.get(&level).ok_or_else(|| {
            KapokError::validation(format!("unknown isolation strategy: {level}"))
        })
    }

    /// Drop every piece of storage `tenant` may own under any registered
    /// strategy. A migrated tenant keeps its shared schema, and a
    /// rolled-back one keeps its dedicated database and pooled connection,
    /// so the current isolation level alone is not enough.
    pub async fn deprovision_all(&self, tenant: &Tenant) -> KapokResult<()> {
        for level in [IsolationLevel::Schema, IsolationLevel::Database] {
            if let Some(strategy) = self.strategies.get(&level) {
                strategy.deprovision(tenant).await?;
            }
        }
        Ok(())
    }

    /// Connection for `tenant` under its current isolation level.
    pub fn connection(&self, tenant: &Tenant) -> KapokResult<D::Connection> {
        self.resolve(tenant.isolation_level)?.connection(tenant)
    }

    pub fn pools(&self) -> &Arc<PoolRegistry<D::Connection>> {
        &self.pools
    }
}
