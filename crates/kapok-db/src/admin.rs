//! Physical storage administration.
//!
//! A tenant schema is a SurrealDB database inside the connection's
//! namespace. A dedicated tenant database is a namespace of its own,
//! reached through a separate client connection.

use kapok_core::error::KapokResult;
use kapok_core::models::tenant::is_valid_schema_name;
use kapok_core::repository::{DatabaseAdmin, SchemaManager, TenantConnection};
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use tracing::{debug, info};

use crate::connection::{DbConfig, open};
use crate::error::DbError;

fn checked(name: &str) -> Result<&str, DbError> {
    if is_valid_schema_name(name) {
        Ok(name)
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

/// Run one DDL statement and surface statement-level errors.
async fn execute(db: &Surreal<Any>, statement: String) -> Result<(), DbError> {
    debug!(statement = %statement, "Executing DDL");
    db.query(statement)
        .await?
        .check()
        .map_err(|e| DbError::Query(e.to_string()))?;
    Ok(())
}

/// A client bound to one namespace; schema DDL runs inside it.
#[derive(Clone)]
pub struct SurrealConnection {
    db: Surreal<Any>,
}

impl SurrealConnection {
    pub fn new(db: Surreal<Any>) -> Self {
        Self { db }
    }

    pub fn client(&self) -> &Surreal<Any> {
        &self.db
    }
}

impl SchemaManager for SurrealConnection {
    async fn create_schema(&self, name: &str) -> KapokResult<()> {
        let name = checked(name)?;
        execute(&self.db, format!("DEFINE DATABASE IF NOT EXISTS `{name}`")).await?;
        info!(schema = %name, "Created tenant schema");
        Ok(())
    }

    async fn drop_schema(&self, name: &str) -> KapokResult<()> {
        let name = checked(name)?;
        execute(&self.db, format!("REMOVE DATABASE IF EXISTS `{name}`")).await?;
        info!(schema = %name, "Dropped tenant schema");
        Ok(())
    }

    async fn schema_exists(&self, name: &str) -> KapokResult<bool> {
        let name = checked(name)?;
        let mut result = self
            .db
            .query("INFO FOR NS")
            .await
            .map_err(DbError::from)?;
        let info: Option<serde_json::Value> = result.take(0).map_err(DbError::from)?;
        Ok(info
            .as_ref()
            .and_then(|i| i.get("databases"))
            .and_then(|d| d.get(name))
            .is_some())
    }
}

impl TenantConnection for SurrealConnection {
    /// Invalidate the session's authentication so this handle can no
    /// longer act on the tenant. The underlying client is released when
    /// its last clone is dropped.
    async fn close(&self) -> KapokResult<()> {
        self.db.invalidate().await.map_err(DbError::from)?;
        Ok(())
    }
}

/// Administration over the configured endpoint.
#[derive(Clone)]
pub struct SurrealAdmin {
    shared: SurrealConnection,
    config: DbConfig,
}

impl SurrealAdmin {
    pub fn new(db: Surreal<Any>, config: DbConfig) -> Self {
        Self {
            shared: SurrealConnection::new(db),
            config,
        }
    }
}

impl DatabaseAdmin for SurrealAdmin {
    type Connection = SurrealConnection;

    fn shared(&self) -> &SurrealConnection {
        &self.shared
    }

    async fn create_database(&self, name: &str) -> KapokResult<()> {
        let name = checked(name)?;
        execute(
            self.shared.client(),
            format!("DEFINE NAMESPACE IF NOT EXISTS `{name}`"),
        )
        .await?;
        info!(database = %name, "Created tenant database");
        Ok(())
    }

    async fn drop_database(&self, name: &str) -> KapokResult<()> {
        let name = checked(name)?;
        execute(
            self.shared.client(),
            format!("REMOVE NAMESPACE IF EXISTS `{name}`"),
        )
        .await?;
        info!(database = %name, "Dropped tenant database");
        Ok(())
    }

    async fn connect(&self, name: &str) -> KapokResult<SurrealConnection> {
        let name = checked(name)?;
        let db = open(&self.config).await?;

        // An embedded endpoint opens a fresh store, so the namespace may
        // not exist on this client yet.
        execute(&db, format!("DEFINE NAMESPACE IF NOT EXISTS `{name}`")).await?;
        db.use_ns(name)
            .use_db(&self.config.database)
            .await
            .map_err(DbError::from)?;

        debug!(database = %name, "Opened tenant database connection");
        Ok(SurrealConnection::new(db))
    }
}
