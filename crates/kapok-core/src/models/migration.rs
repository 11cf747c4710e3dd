//! Isolation-level migration records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tenant::IsolationLevel;
use crate::error::{KapokError, KapokResult};

/// How long after completion a migration may still be rolled back.
pub const ROLLBACK_WINDOW_HOURS: i64 = 24;

pub fn rollback_window() -> Duration {
    Duration::hours(ROLLBACK_WINDOW_HOURS)
}

/// Phases of a migration.
///
/// `Pending → Replicating → Verifying → Cutover → Completed`, with
/// `Failed` reachable from any non-terminal phase and
/// `Completed → RolledBack` as the only transition out of a terminal one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    Pending,
    Replicating,
    Verifying,
    Cutover,
    Completed,
    Failed,
    RolledBack,
}

impl MigrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStatus::Pending => "pending",
            MigrationStatus::Replicating => "replicating",
            MigrationStatus::Verifying => "verifying",
            MigrationStatus::Cutover => "cutover",
            MigrationStatus::Completed => "completed",
            MigrationStatus::Failed => "failed",
            MigrationStatus::RolledBack => "rolled_back",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MigrationStatus::Completed | MigrationStatus::Failed | MigrationStatus::RolledBack
        )
    }

    pub fn can_transition_to(&self, next: MigrationStatus) -> bool {
        use MigrationStatus::*;
        match (self, next) {
            (Pending, Replicating)
            | (Replicating, Verifying)
            | (Verifying, Cutover)
            | (Cutover, Completed)
            | (Completed, RolledBack) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl FromStr for MigrationStatus {
    type Err = KapokError;

    fn from_str(s: &str) -> KapokResult<Self> {
        match s {
            "pending" => Ok(MigrationStatus::Pending),
            "replicating" => Ok(MigrationStatus::Replicating),
            "verifying" => Ok(MigrationStatus::Verifying),
            "cutover" => Ok(MigrationStatus::Cutover),
            "completed" => Ok(MigrationStatus::Completed),
            "failed" => Ok(MigrationStatus::Failed),
            "rolled_back" => Ok(MigrationStatus::RolledBack),
            other => Err(KapokError::validation(format!(
                "invalid migration status: {other}"
            ))),
        }
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attempt to move a tenant between isolation levels.
///
/// Records are append-only apart from status, timestamps and the error
/// message, and are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub from_isolation: IsolationLevel,
    pub to_isolation: IsolationLevel,
    pub status: MigrationStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// `completed_at` plus the rollback window.
    pub rollback_before: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MigrationRecord {
    /// Whether a rollback is permitted at `now`.
    ///
    /// Requires status `Completed` and `now` strictly before
    /// `rollback_before`.
    pub fn check_rollback(&self, now: DateTime<Utc>) -> KapokResult<()> {
        if self.status != MigrationStatus::Completed {
            return Err(KapokError::InvalidMigrationState {
                id: self.id.to_string(),
                status: self.status.to_string(),
                required: MigrationStatus::Completed.to_string(),
            });
        }
        let deadline = self.rollback_before.ok_or_else(|| {
            KapokError::Database(format!(
                "completed migration {} has no rollback deadline",
                self.id
            ))
        })?;
        if now >= deadline {
            return Err(KapokError::RollbackWindowExpired {
                id: self.id.to_string(),
                deadline,
            });
        }
        Ok(())
    }
}

/// Fields required to insert a migration record.
#[derive(Debug, Clone)]
pub struct NewMigration {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub from_isolation: IsolationLevel,
    pub to_isolation: IsolationLevel,
    pub started_at: DateTime<Utc>,
}
