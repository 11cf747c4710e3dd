//! Resource usage snapshots and threshold evaluation types.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Point-in-time resource consumption for one tenant. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantUsage {
    pub tenant_id: Uuid,
    pub storage_bytes: u64,
    pub connection_count: u64,
    pub qps: f64,
}

impl TenantUsage {
    pub fn empty(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            storage_bytes: 0,
            connection_count: 0,
            qps: 0.0,
        }
    }

    /// Add another snapshot's figures into this one.
    pub fn accumulate(&mut self, other: &TenantUsage) {
        self.storage_bytes = self.storage_bytes.saturating_add(other.storage_bytes);
        self.connection_count = self.connection_count.saturating_add(other.connection_count);
        self.qps += other.qps;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    StorageBytes,
    Connections,
    Qps,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::StorageBytes => "storage_bytes",
            Metric::Connections => "connections",
            Metric::Qps => "qps",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric that crossed its tier trigger or quota ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdViolation {
    pub tenant_id: Uuid,
    pub metric: Metric,
    pub current: f64,
    pub threshold: f64,
    /// `current / threshold`.
    pub fraction: f64,
}

/// Resource ceilings for one tier.
///
/// A ceiling of zero leaves that metric unmonitored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub tier: String,
    pub max_storage_bytes: u64,
    pub max_connections: u64,
    pub max_qps: f64,
    /// Fraction of a ceiling (0–1) at which a violation is reported.
    pub migration_trigger: f64,
}

impl TierThresholds {
    pub fn standard() -> Self {
        Self {
            tier: "standard".into(),
            max_storage_bytes: 10 << 30,
            max_connections: 50,
            max_qps: 1000.0,
            migration_trigger: 0.8,
        }
    }

    pub fn premium() -> Self {
        Self {
            tier: "premium".into(),
            max_storage_bytes: 100 << 30,
            max_connections: 200,
            max_qps: 5000.0,
            migration_trigger: 0.9,
        }
    }

    /// Violations for every configured ceiling whose consumed fraction
    /// reaches the migration trigger.
    pub fn evaluate(&self, usage: &TenantUsage) -> Vec<ThresholdViolation> {
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
            .filter(|(_, _, ceiling)| *ceiling > 0.0)
            .filter_map(|(metric, current, ceiling)| {
                let fraction = current / ceiling;
                (fraction >= self.migration_trigger).then_some(ThresholdViolation {
                    tenant_id: usage.tenant_id,
                    metric,
                    current,
                    threshold: ceiling,
                    fraction,
                })
            })
            .collect()
    }
}
