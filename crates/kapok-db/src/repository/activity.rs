//! Live-activity probe over the `tenant_session` registry.

use kapok_core::error::KapokResult;
use kapok_core::repository::ActivityProbe;
use surrealdb::{Connection, Surreal};

use super::CountRow;
use crate::error::DbError;

/// Counts active data-plane sessions per tenant schema.
#[derive(Clone)]
pub struct SurrealActivityProbe<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealActivityProbe<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ActivityProbe for SurrealActivityProbe<C> {
    async fn active_connections(&self, schema_name: &str) -> KapokResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM tenant_session \
                 WHERE schema_name = $schema AND state = 'active' GROUP ALL",
            )
            .bind(("schema", schema_name.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }
}
