//! SurrealDB implementation of [`QuotaRepository`].
//!
//! One `tenant_quota` record per tenant, keyed by the tenant id.

use chrono::{DateTime, Utc};
use kapok_core::error::KapokResult;
use kapok_core::models::quota::{Quota, SetQuota};
use kapok_core::repository::QuotaRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct QuotaRow {
    max_storage_bytes: u64,
    max_connections: u64,
    max_qps: f64,
    max_children: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl QuotaRow {
    fn into_quota(self, tenant_id: Uuid) -> Quota {
        Quota {
            tenant_id,
            max_storage_bytes: self.max_storage_bytes,
            max_connections: self.max_connections,
            max_qps: self.max_qps,
            max_children: self.max_children,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct SurrealQuotaRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealQuotaRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> QuotaRepository for SurrealQuotaRepository<C> {
    async fn upsert(&self, input: SetQuota, at: DateTime<Utc>) -> KapokResult<Quota> {
        let id_str = input.tenant_id.to_string();

        // created_at is only written on first insert.
        let exists = match self.get(input.tenant_id).await {
            Ok(_) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => return Err(e),
        };
        let statement = if exists {
            "UPDATE type::record('tenant_quota', $id) SET \
             max_storage_bytes = $max_storage_bytes, \
             max_connections = $max_connections, max_qps = $max_qps, \
             max_children = $max_children, updated_at = $at"
        } else {
            "CREATE type::record('tenant_quota', $id) SET \
             max_storage_bytes = $max_storage_bytes, \
             max_connections = $max_connections, max_qps = $max_qps, \
             max_children = $max_children, created_at = $at, updated_at = $at"
        };

        let result = self
            .db
            .query(statement)
            .bind(("id", id_str.clone()))
            .bind(("max_storage_bytes", input.max_storage_bytes))
            .bind(("max_connections", input.max_connections))
            .bind(("max_qps", input.max_qps))
            .bind(("max_children", input.max_children))
            .bind(("at", at))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        let rows: Vec<QuotaRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "quota".into(),
            id: id_str,
        })?;

        Ok(row.into_quota(input.tenant_id))
    }

    async fn get(&self, tenant_id: Uuid) -> KapokResult<Quota> {
        let id_str = tenant_id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('tenant_quota', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<QuotaRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "quota".into(),
            id: id_str,
        })?;

        Ok(row.into_quota(tenant_id))
    }
}
