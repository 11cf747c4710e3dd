//! Audit log domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ACTION_CREATE: &str = "tenant.create";
pub const ACTION_CREATE_CHILD: &str = "tenant.create_child";
pub const ACTION_DELETE: &str = "tenant.delete";
pub const ACTION_HARD_DELETE: &str = "tenant.hard_delete";
pub const ACTION_MIGRATE: &str = "tenant.migrate";
pub const ACTION_ROLLBACK: &str = "tenant.rollback";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub action: String,
    pub resource: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditLogEntry {
    pub tenant_id: Uuid,
    pub action: String,
    pub resource: String,
    pub timestamp: DateTime<Utc>,
}

/// Resource string for a tenant-level audit event.
pub fn tenant_resource(tenant_id: &Uuid) -> String {
    format!("tenant:{tenant_id}")
}
