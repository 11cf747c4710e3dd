//! SurrealDB implementation of [`AuditRepository`].

use chrono::{DateTime, Utc};
use kapok_core::error::KapokResult;
use kapok_core::models::audit::{AuditLogEntry, CreateAuditLogEntry};
use kapok_core::repository::{AuditRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct AuditRowWithId {
    record_id: String,
    tenant_id: String,
    action: String,
    resource: String,
    timestamp: DateTime<Utc>,
}

impl AuditRowWithId {
    fn try_into_entry(self) -> Result<AuditLogEntry, DbError> {
        Ok(AuditLogEntry {
            id: parse_uuid(&self.record_id)?,
            tenant_id: parse_uuid(&self.tenant_id)?,
            action: self.action,
            resource: self.resource,
            timestamp: self.timestamp,
        })
    }
}

/// Append-only audit log. Entries are never updated or deleted.
#[derive(Clone)]
pub struct SurrealAuditRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AuditRepository for SurrealAuditRepository<C> {
    async fn record(&self, input: CreateAuditLogEntry) -> KapokResult<AuditLogEntry> {
        let id = Uuid::new_v4();

        self.db
            .query(
                "CREATE type::record('audit_log', $id) SET \
                 tenant_id = $tenant_id, action = $action, \
                 resource = $resource, timestamp = $timestamp",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("action", input.action.clone()))
            .bind(("resource", input.resource.clone()))
            .bind(("timestamp", input.timestamp))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(AuditLogEntry {
            id,
            tenant_id: input.tenant_id,
            action: input.action,
            resource: input.resource,
            timestamp: input.timestamp,
        })
    }

    async fn list_by_tenant(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> KapokResult<PaginatedResult<AuditLogEntry>> {
        let tenant_id_str = tenant_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM audit_log \
                 WHERE tenant_id = $tenant_id GROUP ALL",
            )
            .bind(("tenant_id", tenant_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM audit_log \
                 WHERE tenant_id = $tenant_id \
                 ORDER BY timestamp DESC \
                 LIMIT $limit START $offset",
            )
            .bind(("tenant_id", tenant_id_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AuditRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(AuditRowWithId::try_into_entry)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
