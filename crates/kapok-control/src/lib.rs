//! Kapok control plane: tenant provisioning, isolation strategies,
//! hierarchy and quota enforcement, isolation migrations and the decision
//! engine that triggers them.

pub mod config;
pub mod engine;
pub mod hierarchy;
pub mod isolation;
pub mod migration;
pub mod plane;
pub mod pool;
pub mod provisioner;
pub mod quota;
pub mod threshold;
pub mod usage;
pub mod worker;

mod audit;

pub use config::ControlConfig;
pub use engine::{DecisionEngine, EvaluationReport, PendingApproval};
pub use hierarchy::HierarchyManager;
pub use isolation::{IsolationStrategy, StrategyRegistry};
pub use migration::{MigrationManager, MigrationVerifier, SkipVerification};
pub use plane::{ControlPlane, Repositories};
pub use pool::PoolRegistry;
pub use provisioner::Provisioner;
pub use quota::{QuotaManager, UsageRollup};
pub use threshold::ThresholdManager;
pub use usage::{UsageBatch, UsageCollector, UsageSample};
pub use worker::{MigrationJob, MigrationQueue, MigrationWorker, migration_queue};
