//! Tier ceilings and threshold evaluation.

use std::collections::HashMap;

use kapok_core::models::usage::{TenantUsage, ThresholdViolation, TierThresholds};
use parking_lot::RwLock;
use tracing::warn;

/// Tier label to ceilings, reconfigurable at runtime.
#[derive(Default)]
pub struct ThresholdManager {
    tiers: RwLock<HashMap<String, TierThresholds>>,
}

impl ThresholdManager {
    pub fn new(tiers: impl IntoIterator<Item = TierThresholds>) -> Self {
        Self {
            tiers: RwLock::new(tiers.into_iter().map(|t| (t.tier.clone(), t)).collect()),
        }
    }

    /// Violations for `usage` under `tier`. An unknown tier yields none.
    pub fn evaluate(&self, usage: &TenantUsage, tier: &str) -> Vec<ThresholdViolation> {
        let tiers = self.tiers.read();
        match tiers.get(tier) {
            Some(thresholds) => thresholds.evaluate(usage),
            None => {
                warn!(tenant_id = %usage.tenant_id, tier, "Unknown tier, skipping evaluation");
                Vec::new()
            }
        }
    }

    pub fn set_tier(&self, thresholds: TierThresholds) {
        self.tiers
            .write()
            .insert(thresholds.tier.clone(), thresholds);
    }

    pub fn get_tier(&self, tier: &str) -> Option<TierThresholds> {
        self.tiers.read().get(tier).cloned()
    }
}

#[cfg(test)]
mod tests {
    use kapok_core::models::usage::Metric;
    use uuid::Uuid;

    use super::*;

    fn usage(storage: u64, conns: u64, qps: f64) -> TenantUsage {
        TenantUsage {
            tenant_id: Uuid::new_v4(),
            storage_bytes: storage,
            connection_count: conns,
            qps,
        }
    }

    fn manager() -> ThresholdManager {
        ThresholdManager::new([TierThresholds {
            tier: "small".into(),
            max_storage_bytes: 1000,
            max_connections: 10,
            max_qps: 100.0,
            migration_trigger: 0.8,
        }])
    }

    #[test]
    fn reports_metrics_at_or_above_the_trigger() {
        let m = manager();
        let v = m.evaluate(&usage(800, 7, 79.0), "small");
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].metric, Metric::StorageBytes);
        assert_eq!(v[0].threshold, 1000.0);
        assert!((v[0].fraction - 0.8).abs() < 1e-9);

        let v = m.evaluate(&usage(0, 9, 100.0), "small");
        let metrics: Vec<_> = v.iter().map(|v| v.metric).collect();
        assert_eq!(metrics, vec![Metric::Connections, Metric::Qps]);
    }

    #[test]
    fn below_trigger_is_clean() {
        assert!(manager().evaluate(&usage(799, 7, 79.9), "small").is_empty());
    }

    #[test]
    fn unconfigured_ceilings_never_violate() {
        let m = ThresholdManager::new([TierThresholds {
            tier: "open".into(),
            max_storage_bytes: 0,
            max_connections: 0,
            max_qps: 0.0,
            migration_trigger: 0.0,
        }]);
        assert!(m.evaluate(&usage(u64::MAX, u64::MAX, 1e12), "open").is_empty());
    }

    #[test]
    fn unknown_tier_yields_nothing() {
        assert!(manager().evaluate(&usage(1 << 40, 1000, 1e6), "gold").is_empty());
    }

    #[test]
    fn tiers_can_be_replaced_at_runtime() {
        let m = manager();
        let mut tier = m.get_tier("small").unwrap();
        tier.migration_trigger = 0.5;
        m.set_tier(tier);

        assert_eq!(m.get_tier("small").unwrap().migration_trigger, 0.5);
        assert_eq!(m.evaluate(&usage(500, 0, 0.0), "small").len(), 1);
    }
}
