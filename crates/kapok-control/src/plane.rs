//! Wiring of the control-plane components over one set of repositories.

use std::sync::Arc;

use kapok_core::clock::Clock;
use kapok_core::repository::{
    ActivityProbe, AuditRepository, DatabaseAdmin, MigrationRepository, QuotaRepository,
    TenantRepository,
};

use crate::config::ControlConfig;
use crate::engine::DecisionEngine;
use crate::hierarchy::HierarchyManager;
use crate::isolation::StrategyRegistry;
use crate::migration::{MigrationManager, MigrationVerifier};
use crate::pool::PoolRegistry;
use crate::provisioner::Provisioner;
use crate::quota::QuotaManager;
use crate::threshold::ThresholdManager;
use crate::usage::UsageCollector;
use crate::worker::{MigrationWorker, migration_queue};

/// Repository implementations the control plane runs on.
pub struct Repositories<T, M, Q, A> {
    pub tenants: T,
    pub migrations: M,
    pub quotas: Q,
    pub audit: A,
}

/// Every component, sharing one pool registry, strategy table and
/// migration queue.
pub struct ControlPlane<T, M, Q, A, P, D>
where
    T: TenantRepository,
    M: MigrationRepository,
    Q: QuotaRepository,
    A: AuditRepository,
    P: ActivityProbe,
    D: DatabaseAdmin,
{
    pub pools: Arc<PoolRegistry<D::Connection>>,
    pub strategies: Arc<StrategyRegistry<D>>,
    pub hierarchy: Arc<HierarchyManager<T>>,
    pub quotas: Arc<QuotaManager<Q, T>>,
    pub collector: Arc<UsageCollector<T, P>>,
    pub thresholds: Arc<ThresholdManager>,
    pub provisioner: Arc<Provisioner<T, Q, A, D>>,
    pub migrations: Arc<MigrationManager<T, M, A, D>>,
    pub engine: Arc<DecisionEngine<T, P>>,
}

impl<T, M, Q, A, P, D> ControlPlane<T, M, Q, A, P, D>
where
    T: TenantRepository + Clone + 'static,
    M: MigrationRepository + 'static,
    Q: QuotaRepository,
    A: AuditRepository + Clone + 'static,
    P: ActivityProbe,
    D: DatabaseAdmin,
{
    /// Build the plane and the worker that must be spawned to run queued
    /// migrations.
    pub fn build(
        repos: Repositories<T, M, Q, A>,
        admin: D,
        probe: P,
        verifier: Arc<dyn MigrationVerifier>,
        clock: Arc<dyn Clock>,
        config: ControlConfig,
    ) -> (Self, MigrationWorker<T, M, A, D>) {
        let Repositories {
            tenants,
            migrations,
            quotas,
            audit,
        } = repos;

        let pools = Arc::new(PoolRegistry::new());
        let strategies = Arc::new(StrategyRegistry::standard(Arc::new(admin), pools.clone()));

        let hierarchy = Arc::new(HierarchyManager::new(tenants.clone()));
        let quotas = Arc::new(QuotaManager::new(quotas, hierarchy.clone(), clock.clone()));
        let collector = Arc::new(UsageCollector::new(tenants.clone(), probe));
        let thresholds = Arc::new(ThresholdManager::new(config.tiers.clone()));

        let provisioner = Arc::new(Provisioner::new(
            tenants.clone(),
            audit.clone(),
            quotas.clone(),
            strategies.clone(),
            clock.clone(),
            config.default_tier.clone(),
        ));

        let migrations = Arc::new(
            MigrationManager::new(
                tenants.clone(),
                migrations,
                audit,
                strategies.clone(),
                clock.clone(),
            )
            .with_verifier(verifier),
        );

        let (queue, receiver) = migration_queue(config.queue_capacity);
        let worker = MigrationWorker::new(
            migrations.clone(),
            receiver,
            config.max_concurrent_migrations,
        );

        let engine = Arc::new(DecisionEngine::new(
            tenants,
            collector.clone(),
            thresholds.clone(),
            queue,
            clock,
            config,
        ));

        let plane = Self {
            pools,
            strategies,
            hierarchy,
            quotas,
            collector,
            thresholds,
            provisioner,
            migrations,
            engine,
        };
        (plane, worker)
    }
}
