//! Control-plane configuration.

use std::time::Duration;

use kapok_core::models::tenant::DEFAULT_TIER;
use kapok_core::models::usage::TierThresholds;

pub const DEFAULT_COOLDOWN_SECS: u64 = 60 * 60;
pub const DEFAULT_EVALUATION_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_MAX_CONCURRENT_MIGRATIONS: usize = 2;

/// Configuration for the decision engine and migration queue.
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// Tier ceilings loaded into the threshold manager at startup.
    pub tiers: Vec<TierThresholds>,
    /// Tier assigned to new root tenants.
    pub default_tier: String,
    /// When false the engine only reports violations.
    pub auto_migration_enabled: bool,
    /// Minimum gap between engine-initiated migrations of one tenant
    /// (default: 1 hour).
    pub cooldown: Duration,
    /// Queue recommendations for approval instead of migrating
    /// (default: true).
    pub approval_required: bool,
    /// Engine loop period (default: 60 seconds).
    pub evaluation_interval: Duration,
    /// Pending jobs the migration queue holds before rejecting more.
    pub queue_capacity: usize,
    /// Migrations the worker runs at once.
    pub max_concurrent_migrations: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tiers: vec![TierThresholds::standard(), TierThresholds::premium()],
            default_tier: DEFAULT_TIER.into(),
            auto_migration_enabled: true,
            cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
            approval_required: true,
            evaluation_interval: Duration::from_secs(DEFAULT_EVALUATION_INTERVAL_SECS),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_concurrent_migrations: DEFAULT_MAX_CONCURRENT_MIGRATIONS,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| s.to_lowercase() != "false")
        .unwrap_or(default)
}

impl ControlConfig {
    /// Create a `ControlConfig` from environment variables.
    ///
    /// # Environment Variables
    /// - `KAPOK_DEFAULT_TIER` (default: `standard`)
    /// - `KAPOK_AUTO_MIGRATION` (default: true)
    /// - `KAPOK_MIGRATION_COOLDOWN_SECS` (default: 3600)
    /// - `KAPOK_MIGRATION_APPROVAL_REQUIRED` (default: true)
    /// - `KAPOK_EVALUATION_INTERVAL_SECS` (default: 60)
    /// - `KAPOK_MIGRATION_QUEUE_CAPACITY` (default: 64)
    /// - `KAPOK_MAX_CONCURRENT_MIGRATIONS` (default: 2)
    ///
    /// Tier ceilings are not read from the environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            tiers: defaults.tiers,
            default_tier: std::env::var("KAPOK_DEFAULT_TIER").unwrap_or(defaults.default_tier),
            auto_migration_enabled: env_flag(
                "KAPOK_AUTO_MIGRATION",
                defaults.auto_migration_enabled,
            ),
            cooldown: Duration::from_secs(
                env_parse("KAPOK_MIGRATION_COOLDOWN_SECS").unwrap_or(DEFAULT_COOLDOWN_SECS),
            ),
            approval_required: env_flag(
                "KAPOK_MIGRATION_APPROVAL_REQUIRED",
                defaults.approval_required,
            ),
            evaluation_interval: Duration::from_secs(
                env_parse("KAPOK_EVALUATION_INTERVAL_SECS")
                    .unwrap_or(DEFAULT_EVALUATION_INTERVAL_SECS),
            ),
            queue_capacity: env_parse("KAPOK_MIGRATION_QUEUE_CAPACITY")
                .unwrap_or(DEFAULT_QUEUE_CAPACITY)
                .max(1),
            max_concurrent_migrations: env_parse("KAPOK_MAX_CONCURRENT_MIGRATIONS")
                .unwrap_or(DEFAULT_MAX_CONCURRENT_MIGRATIONS)
                .max(1),
        }
    }
}
