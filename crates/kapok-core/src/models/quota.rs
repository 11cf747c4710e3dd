//! Per-tenant quota overrides.
//!
//! Quotas are explicit, tenant-specific ceilings that sit beside the
//! tier thresholds. A zero on any field means "no limit" for that
//! dimension.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::usage::{Metric, TenantUsage, ThresholdViolation};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quota {
    pub tenant_id: Uuid,
    pub max_storage_bytes: u64,
    pub max_connections: u64,
    pub max_qps: f64,
    pub max_children: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted by a quota upsert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetQuota {
    pub tenant_id: Uuid,
    pub max_storage_bytes: u64,
    pub max_connections: u64,
    pub max_qps: f64,
    pub max_children: u64,
}

impl Quota {
    /// Violations for every non-zero ceiling that `usage` exceeds.
    pub fn violations(&self, usage: &TenantUsage) -> Vec<ThresholdViolation> {
        let checks = [
            (
                Metric::StorageBytes,
                usage.storage_bytes as f64,
                self.max_storage_bytes as f64,
            ),
            (
                Metric::Connections,
                usage.connection_count as f64,
                self.max_connections as f64,
            ),
            (Metric::Qps, usage.qps, self.max_qps),
        ];

        checks
            .into_iter()
            .filter(|(_, current, ceiling)| *ceiling > 0.0 && current > ceiling)
            .map(|(metric, current, ceiling)| ThresholdViolation {
                tenant_id: self.tenant_id,
                metric,
                current,
                threshold: ceiling,
                fraction: current / ceiling,
            })
            .collect()
    }

    /// Whether a tenant with `children` direct children may add another.
    pub fn allows_child(&self, children: u64) -> bool {
        self.max_children == 0 || children < self.max_children
    }
}
