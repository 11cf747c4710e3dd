//! Live resource sampling.

use kapok_core::error::KapokResult;
use kapok_core::models::tenant::{Tenant, TenantStatus};
use kapok_core::models::usage::TenantUsage;
use kapok_core::repository::{ActivityProbe, TenantRepository};
use tracing::{debug, warn};
use uuid::Uuid;

/// A usage snapshot together with the tenant row it was taken from.
#[derive(Debug, Clone)]
pub struct UsageSample {
    pub tenant: Tenant,
    pub usage: TenantUsage,
}

/// Result of sampling every active tenant.
#[derive(Debug, Default)]
pub struct UsageBatch {
    pub samples: Vec<UsageSample>,
    /// Tenants skipped because their sample could not be taken.
    pub failures: usize,
}

pub struct UsageCollector<T: TenantRepository, P: ActivityProbe> {
    tenants: T,
    probe: P,
}

impl<T: TenantRepository, P: ActivityProbe> UsageCollector<T, P> {
    pub fn new(tenants: T, probe: P) -> Self {
        Self { tenants, probe }
    }

    pub async fn collect_usage(&self, tenant_id: Uuid) -> KapokResult<TenantUsage> {
        Ok(self.sample(tenant_id).await?.usage)
    }

    /// Load the tenant and snapshot its usage.
    pub async fn sample(&self, tenant_id: Uuid) -> KapokResult<UsageSample> {
        let tenant = self.tenants.get_by_id(tenant_id).await?;
        let usage = self.collect_for_tenant(&tenant).await;
        Ok(UsageSample { tenant, usage })
    }

    /// Snapshot usage for an already loaded tenant.
    ///
    /// The connection count is best effort and falls back to zero. QPS has
    /// no feed and is always zero.
    pub async fn collect_for_tenant(&self, tenant: &Tenant) -> TenantUsage {
        let connection_count = match self.probe.active_connections(&tenant.schema_name).await {
            Ok(count) => count,
            Err(e) => {
                debug!(tenant_id = %tenant.id, error = %e, "Activity probe failed, assuming no connections");
                0
            }
        };

        TenantUsage {
            tenant_id: tenant.id,
            storage_bytes: tenant.storage_used_bytes,
            connection_count,
            qps: 0.0,
        }
    }

    /// Sample every active tenant, skipping the ones that fail.
    pub async fn collect_all_usage(&self) -> KapokResult<UsageBatch> {
        let tenants = self.tenants.list_by_status(TenantStatus::Active).await?;

        let mut batch = UsageBatch::default();
        for tenant in tenants {
            match self.sample(tenant.id).await {
                Ok(sample) => batch.samples.push(sample),
                Err(e) => {
                    warn!(tenant_id = %tenant.id, error = %e, "Failed to collect tenant usage");
                    batch.failures += 1;
                }
            }
        }
        Ok(batch)
    }
}
