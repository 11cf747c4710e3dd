//! Explicit per-tenant quota overrides.

use std::sync::Arc;

use kapok_core::clock::Clock;
use kapok_core::error::{KapokError, KapokResult};
use kapok_core::models::quota::{Quota, SetQuota};
use kapok_core::models::usage::{TenantUsage, ThresholdViolation};
use kapok_core::repository::{ActivityProbe, QuotaRepository, TenantRepository};
use tracing::{info, warn};
use uuid::Uuid;

use crate::hierarchy::HierarchyManager;
use crate::usage::UsageCollector;

/// Usage summed over a tenant and all of its descendants.
#[derive(Debug, Clone)]
pub struct UsageRollup {
    pub usage: TenantUsage,
    /// Tenants whose usage made it into the total.
    pub collected: usize,
    /// Tenants skipped because collection failed.
    pub failures: usize,
}

pub struct QuotaManager<Q: QuotaRepository, T: TenantRepository> {
    quotas: Q,
    hierarchy: Arc<HierarchyManager<T>>,
    clock: Arc<dyn Clock>,
}

impl<Q: QuotaRepository, T: TenantRepository> QuotaManager<Q, T> {
    pub fn new(quotas: Q, hierarchy: Arc<HierarchyManager<T>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            quotas,
            hierarchy,
            clock,
        }
    }

    pub async fn set_quota(&self, input: SetQuota) -> KapokResult<Quota> {
        if !input.max_qps.is_finite() || input.max_qps < 0.0 {
            return Err(KapokError::validation(format!(
                "max_qps must be a non-negative number, got {}",
                input.max_qps
            )));
        }
        let tenant_id = input.tenant_id;
        let quota = self.quotas.upsert(input, self.clock.now()).await?;
        info!(tenant_id = %tenant_id, "Quota updated");
        Ok(quota)
    }

    /// Fails with `NotFound` when the tenant has no explicit quota.
    pub async fn get_quota(&self, tenant_id: Uuid) -> KapokResult<Quota> {
        self.quotas.get(tenant_id).await
    }

    /// The tenant's quota, or `None` when it has no explicit one.
    async fn find_quota(&self, tenant_id: Uuid) -> KapokResult<Option<Quota>> {
        match self.quotas.get(tenant_id).await {
            Ok(quota) => Ok(Some(quota)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Reject a new child once the parent's `max_children` is reached.
    pub async fn check_child_quota(&self, parent_id: Uuid) -> KapokResult<()> {
        let Some(quota) = self.find_quota(parent_id).await? else {
            return Ok(());
        };
        if quota.max_children == 0 {
            return Ok(());
        }

        let children = self.hierarchy.count_children(parent_id).await?;
        if !quota.allows_child(children) {
            return Err(KapokError::QuotaExceeded {
                tenant_id: parent_id.to_string(),
                reason: format!(
                    "maximum children ({}) reached, currently {children}",
                    quota.max_children
                ),
            });
        }
        Ok(())
    }

    /// Every non-zero ceiling that `usage` exceeds. No quota means no
    /// violations.
    pub async fn enforce_quota(
        &self,
        tenant_id: Uuid,
        usage: &TenantUsage,
    ) -> KapokResult<Vec<ThresholdViolation>> {
        Ok(self
            .find_quota(tenant_id)
            .await?
            .map(|quota| quota.violations(usage))
            .unwrap_or_default())
    }

    /// Sum the usage of `tenant_id` and every descendant.
    pub async fn rollup_usage<P: ActivityProbe>(
        &self,
        tenant_id: Uuid,
        collector: &UsageCollector<T, P>,
    ) -> KapokResult<UsageRollup> {
        let descendants = self.hierarchy.get_subtree(tenant_id).await?;

        let mut rollup = UsageRollup {
            usage: TenantUsage::empty(tenant_id),
            collected: 0,
            failures: 0,
        };

        let ids = std::iter::once(tenant_id).chain(descendants.iter().map(|t| t.id));
        for id in ids {
            match collector.collect_usage(id).await {
                Ok(usage) => {
                    rollup.usage.accumulate(&usage);
                    rollup.collected += 1;
                }
                Err(e) => {
                    warn!(tenant_id = %tenant_id, descendant_id = %id, error = %e, "Skipping tenant in usage rollup");
                    rollup.failures += 1;
                }
            }
        }
        Ok(rollup)
    }
}
