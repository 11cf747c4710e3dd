//! Closed-loop decision engine.
//!
//! Each cycle samples every active tenant, evaluates its tier thresholds
//! and, for violating tenants still on schema isolation, either queues an
//! upgrade to a dedicated database or records a pending approval. A
//! per-tenant cooldown bounds how often the engine acts on one tenant.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use kapok_core::clock::Clock;
use kapok_core::error::{KapokError, KapokResult};
use kapok_core::models::migration::MigrationRecord;
use kapok_core::models::tenant::IsolationLevel;
use kapok_core::models::usage::ThresholdViolation;
use kapok_core::repository::{ActivityProbe, TenantRepository};
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ControlConfig;
use crate::threshold::ThresholdManager;
use crate::usage::UsageCollector;
use crate::worker::MigrationQueue;

/// A recommended migration waiting for an operator.
#[derive(Debug, Clone)]
pub struct PendingApproval {
    pub tenant_id: Uuid,
    pub target: IsolationLevel,
    pub violations: Vec<ThresholdViolation>,
    pub requested_at: DateTime<Utc>,
}

/// Outcome of one evaluation cycle.
#[derive(Debug, Default)]
pub struct EvaluationReport {
    pub violations: Vec<ThresholdViolation>,
    pub evaluated: usize,
    pub triggered: usize,
    pub queued_for_approval: usize,
    pub skipped_cooldown: usize,
    /// Tenants whose usage could not be collected.
    pub failures: usize,
}

pub struct DecisionEngine<T: TenantRepository, P: ActivityProbe> {
    tenants: T,
    collector: Arc<UsageCollector<T, P>>,
    thresholds: Arc<ThresholdManager>,
    queue: MigrationQueue,
    clock: Arc<dyn Clock>,
    config: ControlConfig,
    cooldowns: RwLock<HashMap<Uuid, DateTime<Utc>>>,
    pending: RwLock<HashMap<Uuid, PendingApproval>>,
}

impl<T: TenantRepository, P: ActivityProbe> DecisionEngine<T, P> {
    pub fn new(
        tenants: T,
        collector: Arc<UsageCollector<T, P>>,
        thresholds: Arc<ThresholdManager>,
        queue: MigrationQueue,
        clock: Arc<dyn Clock>,
        config: ControlConfig,
    ) -> Self {
        Self {
            tenants,
            collector,
            thresholds,
            queue,
            clock,
            config,
            cooldowns: RwLock::new(HashMap::new()),
            pending: RwLock::new(HashMap::new()),
        }
    }

    /// Run one evaluation cycle over every active tenant.
    pub async fn evaluate_all(&self) -> KapokResult<EvaluationReport> {
        let batch = self.collector.collect_all_usage().await?;
        let mut report = EvaluationReport {
            failures: batch.failures,
            ..Default::default()
        };

        for sample in batch.samples {
            report.evaluated += 1;
            let tenant = sample.tenant;

            let violations = self.thresholds.evaluate(&sample.usage, &tenant.tier);
            if violations.is_empty() {
                continue;
            }
            for v in &violations {
                info!(
                    tenant_id = %tenant.id,
                    tier = %tenant.tier,
                    metric = %v.metric,
                    current = v.current,
                    threshold = v.threshold,
                    fraction = v.fraction,
                    "Threshold violation"
                );
            }
            report.violations.extend(violations.iter().cloned());

            if !self.config.auto_migration_enabled {
                continue;
            }

            let now = self.clock.now();
            if self.in_cooldown(tenant.id, now) {
                debug!(tenant_id = %tenant.id, "Tenant in migration cooldown");
                report.skipped_cooldown += 1;
                continue;
            }
            if tenant.isolation_level != IsolationLevel::Schema {
                continue;
            }

            if self.config.approval_required {
                self.pending.write().insert(
                    tenant.id,
                    PendingApproval {
                        tenant_id: tenant.id,
                        target: IsolationLevel::Database,
                        violations,
                        requested_at: now,
                    },
                );
                info!(tenant_id = %tenant.id, "Migration to database isolation awaiting approval");
                report.queued_for_approval += 1;
                continue;
            }

            if !self.claim_cooldown(tenant.id, now) {
                debug!(tenant_id = %tenant.id, "Cooldown claimed by a concurrent evaluation");
                report.skipped_cooldown += 1;
                continue;
            }
            match self.queue.try_submit(
                tenant.id,
                IsolationLevel::Schema,
                IsolationLevel::Database,
            ) {
                Ok(()) => {
                    info!(tenant_id = %tenant.id, "Auto-migration to database isolation queued");
                    report.triggered += 1;
                }
                Err(e) => {
                    warn!(tenant_id = %tenant.id, error = %e, "Auto-migration not queued, retrying next cycle");
                    self.cooldowns.write().remove(&tenant.id);
                }
            }
        }

        Ok(report)
    }

    /// Consume the tenant's pending approval and queue its migration.
    ///
    /// Returns once the `pending` record exists; poll the migration for
    /// progress. If the queue rejects the job the approval is restored.
    pub async fn approve_migration(&self, tenant_id: Uuid) -> KapokResult<MigrationRecord> {
        let approval = self
            .pending
            .write()
            .remove(&tenant_id)
            .ok_or_else(|| KapokError::not_found("pending approval", tenant_id))?;

        let now = self.clock.now();
        self.start_cooldown(tenant_id, now);

        let result = match self.tenants.get_by_id(tenant_id).await {
            Ok(tenant) => {
                self.queue
                    .submit(tenant_id, tenant.isolation_level, approval.target)
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(record) => {
                info!(tenant_id = %tenant_id, migration_id = %record.id, "Approved migration started");
                Ok(record)
            }
            Err(e @ KapokError::QueueUnavailable(_)) => {
                self.cooldowns.write().remove(&tenant_id);
                self.pending.write().insert(tenant_id, approval);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Snapshot of the recommendations awaiting approval.
    pub fn pending_approvals(&self) -> Vec<PendingApproval> {
        self.pending.read().values().cloned().collect()
    }

    /// End of the tenant's cooldown, if one was ever started.
    pub fn cooldown_until(&self, tenant_id: Uuid) -> Option<DateTime<Utc>> {
        self.cooldowns.read().get(&tenant_id).copied()
    }

    fn in_cooldown(&self, tenant_id: Uuid, now: DateTime<Utc>) -> bool {
        self.cooldowns
            .read()
            .get(&tenant_id)
            .is_some_and(|until| now < *until)
    }

    fn cooldown_deadline(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.config.cooldown)
            .ok()
            .and_then(|cooldown| now.checked_add_signed(cooldown))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn start_cooldown(&self, tenant_id: Uuid, now: DateTime<Utc>) {
        let until = self.cooldown_deadline(now);
        self.cooldowns.write().insert(tenant_id, until);
    }

    /// Start a cooldown unless one is still running. Check and insert
    /// happen under one write guard.
    fn claim_cooldown(&self, tenant_id: Uuid, now: DateTime<Utc>) -> bool {
        let until = self.cooldown_deadline(now);
        let mut cooldowns = self.cooldowns.write();
        if cooldowns.get(&tenant_id).is_some_and(|current| now < *current) {
            return false;
        }
        cooldowns.insert(tenant_id, until);
        true
    }

    /// Evaluate on every tick until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.config.evaluation_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_secs = self.config.evaluation_interval.as_secs(),
            auto_migration = self.config.auto_migration_enabled,
            approval_required = self.config.approval_required,
            "Decision engine started"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Decision engine shutting down");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    match self.evaluate_all().await {
                        Ok(report) => info!(
                            evaluated = report.evaluated,
                            violations = report.violations.len(),
                            triggered = report.triggered,
                            queued_for_approval = report.queued_for_approval,
                            skipped_cooldown = report.skipped_cooldown,
                            failures = report.failures,
                            "Evaluation cycle complete"
                        ),
                        Err(e) => error!(error = %e, "Evaluation cycle failed"),
                    }
                }
            }
        }
    }
}
