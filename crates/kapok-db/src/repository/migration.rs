//! SurrealDB implementation of [`MigrationRepository`].

use chrono::{DateTime, Utc};
use kapok_core::error::KapokResult;
use kapok_core::models::migration::{MigrationRecord, MigrationStatus, NewMigration};
use kapok_core::repository::MigrationRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{parse_enum, parse_uuid};
use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct MigrationRow {
    tenant_id: String,
    from_isolation: String,
    to_isolation: String,
    status: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    rollback_before: Option<DateTime<Utc>>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}

impl MigrationRow {
    fn into_record(self, id: Uuid) -> Result<MigrationRecord, DbError> {
        Ok(MigrationRecord {
            id,
            tenant_id: parse_uuid(&self.tenant_id)?,
            from_isolation: parse_enum(&self.from_isolation)?,
            to_isolation: parse_enum(&self.to_isolation)?,
            status: parse_enum(&self.status)?,
            started_at: self.started_at,
            completed_at: self.completed_at,
            rollback_before: self.rollback_before,
            error_message: self.error_message,
            created_at: self.created_at,
        })
    }
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct MigrationRowWithId {
    record_id: String,
    tenant_id: String,
    from_isolation: String,
    to_isolation: String,
    status: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    rollback_before: Option<DateTime<Utc>>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}

impl MigrationRowWithId {
    fn try_into_record(self) -> Result<MigrationRecord, DbError> {
        let id = parse_uuid(&self.record_id)?;
        MigrationRow {
            tenant_id: self.tenant_id,
            from_isolation: self.from_isolation,
            to_isolation: self.to_isolation,
            status: self.status,
            started_at: self.started_at,
            completed_at: self.completed_at,
            rollback_before: self.rollback_before,
            error_message: self.error_message,
            created_at: self.created_at,
        }
        .into_record(id)
    }
}


/// SurrealDB implementation of the migration record repository.
#[derive(Clone)]
pub struct SurrealMigrationRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealMigrationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

fn not_found(id: String) -> DbError {
    DbError::NotFound {
        entity: "migration".into(),
        id,
    }
}

impl<C: Connection> MigrationRepository for SurrealMigrationRepository<C> {
    async fn create(&self, input: NewMigration) -> KapokResult<MigrationRecord> {
        let id_str = input.id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('tenant_migration', $id) SET \
                 tenant_id = $tenant_id, from_isolation = $from, \
                 to_isolation = $to, status = 'pending', \
                 started_at = $started_at, created_at = $started_at",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("from", input.from_isolation.as_str()))
            .bind(("to", input.to_isolation.as_str()))
            .bind(("started_at", input.started_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        let rows: Vec<MigrationRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| not_found(id_str))?;

        Ok(row.into_record(input.id)?)
    }

    async fn get(&self, id: Uuid) -> KapokResult<MigrationRecord> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('tenant_migration', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MigrationRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| not_found(id_str))?;

        Ok(row.into_record(id)?)
    }

    async fn update_status(&self, id: Uuid, status: MigrationStatus) -> KapokResult<()> {
        let id_str = id.to_string();

        let result = self
            .db
            .query("UPDATE type::record('tenant_migration', $id) SET status = $status")
            .bind(("id", id_str.clone()))
            .bind(("status", status.as_str()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        let rows: Vec<MigrationRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(not_found(id_str).into());
        }
        Ok(())
    }

    async fn fail(&self, id: Uuid, message: &str) -> KapokResult<()> {
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "UPDATE type::record('tenant_migration', $id) \
                 SET status = 'failed', error_message = $message",
            )
            .bind(("id", id_str.clone()))
            .bind(("message", message.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        let rows: Vec<MigrationRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(not_found(id_str).into());
        }
        Ok(())
    }

    async fn complete(
        &self,
        id: Uuid,
        completed_at: DateTime<Utc>,
        rollback_before: DateTime<Utc>,
    ) -> KapokResult<()> {
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "UPDATE type::record('tenant_migration', $id) \
                 SET status = 'completed', completed_at = $completed_at, \
                 rollback_before = $rollback_before",
            )
            .bind(("id", id_str.clone()))
            .bind(("completed_at", completed_at))
            .bind(("rollback_before", rollback_before))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        let rows: Vec<MigrationRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(not_found(id_str).into());
        }
        Ok(())
    }

    async fn list_by_tenant(&self, tenant_id: Uuid) -> KapokResult<Vec<MigrationRecord>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM tenant_migration \
                 WHERE tenant_id = $tenant_id \
                 ORDER BY created_at DESC",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MigrationRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(MigrationRowWithId::try_into_record)
            .collect::<Result<Vec<_>, DbError>>()?)
    }
}
