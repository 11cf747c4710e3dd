//! SurrealDB implementation of [`TenantRepository`].

use chrono::{DateTime, Utc};
use kapok_core::error::KapokResult;
use kapok_core::models::tenant::{IsolationLevel, NewTenant, Tenant, TenantStatus};
use kapok_core::repository::{PaginatedResult, Pagination, TenantRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_enum, parse_uuid};
use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct TenantRow {
    name: String,
    slug: String,
    schema_name: String,
    status: String,
    isolation_level: String,
    parent_id: Option<String>,
    hierarchy_level: String,
    path: String,
    tier: String,
    storage_used_bytes: u64,
    last_activity: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TenantRow {
    fn into_tenant(self, id: Uuid) -> Result<Tenant, DbError> {
        Ok(Tenant {
            id,
            name: self.name,
            slug: self.slug,
            schema_name: self.schema_name,
            status: parse_enum(&self.status)?,
            isolation_level: parse_enum(&self.isolation_level)?,
            parent_id: self.parent_id.as_deref().map(parse_uuid).transpose()?,
            hierarchy_level: parse_enum(&self.hierarchy_level)?,
            path: self.path,
            tier: self.tier,
            storage_used_bytes: self.storage_used_bytes,
            last_activity: self.last_activity,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct TenantRowWithId {
    record_id: String,
    name: String,
    slug: String,
    schema_name: String,
    status: String,
    isolation_level: String,
    parent_id: Option<String>,
    hierarchy_level: String,
    path: String,
    tier: String,
    storage_used_bytes: u64,
    last_activity: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TenantRowWithId {
    fn try_into_tenant(self) -> Result<Tenant, DbError> {
        let id = parse_uuid(&self.record_id)?;
        TenantRow {
            name: self.name,
            slug: self.slug,
            schema_name: self.schema_name,
            status: self.status,
            isolation_level: self.isolation_level,
            parent_id: self.parent_id,
            hierarchy_level: self.hierarchy_level,
            path: self.path,
            tier: self.tier,
            storage_used_bytes: self.storage_used_bytes,
            last_activity: self.last_activity,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_tenant(id)
    }
}

fn collect(rows: Vec<TenantRowWithId>) -> Result<Vec<Tenant>, DbError> {
    rows.into_iter().map(|row| row.try_into_tenant()).collect()
}

/// SurrealDB implementation of the Tenant repository.
#[derive(Clone)]
pub struct SurrealTenantRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTenantRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Run a single-statement update against one tenant record and fail
    /// with `NotFound` when nothing matched.
    async fn update_one(&self, id: Uuid, query: &'static str, bind: Binding) -> KapokResult<()> {
        let id_str = id.to_string();
        let builder = self.db.query(query).bind(("id", id_str.clone()));
        let builder = match bind {
            Binding::Status(status, at) => builder
                .bind(("status", status.as_str()))
                .bind(("at", at)),
            Binding::Isolation(level, at) => builder
                .bind(("isolation_level", level.as_str()))
                .bind(("at", at)),
            Binding::Storage(bytes, at) => builder.bind(("bytes", bytes)).bind(("at", at)),
        };

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: "tenant".into(),
                id: id_str,
            }
            .into());
        }
        Ok(())
    }

    async fn select_where(
        &self,
        condition: &'static str,
        key: &'static str,
        value: String,
    ) -> KapokResult<Vec<Tenant>> {
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM tenant \
             WHERE {condition} ORDER BY created_at ASC"
        );
        let mut result = self
            .db
            .query(query)
            .bind((key, value))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(collect(rows)?)
    }
}

enum Binding {
    Status(TenantStatus, DateTime<Utc>),
    Isolation(IsolationLevel, DateTime<Utc>),
    Storage(u64, DateTime<Utc>),
}

impl<C: Connection> TenantRepository for SurrealTenantRepository<C> {
    async fn create(&self, input: NewTenant) -> KapokResult<Tenant> {
        let id_str = input.id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('tenant', $id) SET \
                 name = $name, slug = $slug, schema_name = $schema_name, \
                 status = $status, isolation_level = $isolation_level, \
                 parent_id = $parent_id, hierarchy_level = $hierarchy_level, \
                 path = $path, tier = $tier, storage_used_bytes = 0, \
                 created_at = $created_at, updated_at = $created_at",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("slug", input.slug))
            .bind(("schema_name", input.schema_name))
            .bind(("status", input.status.as_str()))
            .bind(("isolation_level", input.isolation_level.as_str()))
            .bind(("parent_id", input.parent_id.map(|p| p.to_string())))
            .bind(("hierarchy_level", input.hierarchy_level.as_str()))
            .bind(("path", input.path))
            .bind(("tier", input.tier))
            .bind(("created_at", input.created_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::statement("tenant", e))?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: id_str,
        })?;

        Ok(row.into_tenant(input.id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> KapokResult<Tenant> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('tenant', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: id_str,
        })?;

        Ok(row.into_tenant(id)?)
    }

    async fn get_by_name(&self, name: &str) -> KapokResult<Tenant> {
        let mut tenants = self
            .select_where("name = $name", "name", name.to_string())
            .await?;
        if tenants.is_empty() {
            return Err(DbError::NotFound {
                entity: "tenant".into(),
                id: format!("name={name}"),
            }
            .into());
        }
        Ok(tenants.swap_remove(0))
    }

    async fn list(
        &self,
        status: Option<TenantStatus>,
        pagination: Pagination,
    ) -> KapokResult<PaginatedResult<Tenant>> {
        let filter = if status.is_some() {
            "WHERE status = $status"
        } else {
            ""
        };
        let status_str = status.map(|s| s.as_str());

        let mut count_result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM tenant {filter} GROUP ALL"
            ))
            .bind(("status", status_str))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * FROM tenant {filter} \
                 ORDER BY created_at DESC \
                 LIMIT $limit START $offset"
            ))
            .bind(("status", status_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRowWithId> = result.take(0).map_err(DbError::from)?;

        Ok(PaginatedResult {
            items: collect(rows)?,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_by_status(&self, status: TenantStatus) -> KapokResult<Vec<Tenant>> {
        self.select_where("status = $status", "status", status.as_str().to_string())
            .await
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: TenantStatus,
        at: DateTime<Utc>,
    ) -> KapokResult<()> {
        self.update_one(
            id,
            "UPDATE type::record('tenant', $id) SET status = $status, updated_at = $at",
            Binding::Status(status, at),
        )
        .await
    }

    async fn update_isolation(
        &self,
        id: Uuid,
        level: IsolationLevel,
        at: DateTime<Utc>,
    ) -> KapokResult<()> {
        self.update_one(
            id,
            "UPDATE type::record('tenant', $id) \
             SET isolation_level = $isolation_level, updated_at = $at",
            Binding::Isolation(level, at),
        )
        .await
    }

    async fn record_storage_usage(
        &self,
        id: Uuid,
        bytes: u64,
        at: DateTime<Utc>,
    ) -> KapokResult<()> {
        self.update_one(
            id,
            "UPDATE type::record('tenant', $id) \
             SET storage_used_bytes = $bytes, last_activity = $at, updated_at = $at",
            Binding::Storage(bytes, at),
        )
        .await
    }

    async fn delete(&self, id: Uuid) -> KapokResult<()> {
        self.db
            .query("DELETE type::record('tenant', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list_children(&self, parent_id: Uuid) -> KapokResult<Vec<Tenant>> {
        self.select_where("parent_id = $parent_id", "parent_id", parent_id.to_string())
            .await
    }

    async fn count_children(&self, parent_id: Uuid) -> KapokResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM tenant \
                 WHERE parent_id = $parent_id GROUP ALL",
            )
            .bind(("parent_id", parent_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    async fn list_by_ids(&self, ids: &[Uuid]) -> KapokResult<Vec<Tenant>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM tenant \
                 WHERE meta::id(id) IN $ids",
            )
            .bind(("ids", ids))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(collect(rows)?)
    }

    async fn list_descendants(&self, path: &str) -> KapokResult<Vec<Tenant>> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        self.select_where("string::starts_with(path, $prefix)", "prefix", prefix)
            .await
    }
}
