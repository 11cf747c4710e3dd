//! Control-table definitions and migration runner for SurrealDB.
//!
//! All tables are SCHEMAFULL. UUIDs are stored as strings and enums as
//! strings with ASSERT constraints.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct AppliedMigration {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "control_tables",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "tenant_sessions",
        sql: SCHEMA_V2,
    },
];

// -----------------------------------------------------------------------
// Schema v1: tenants, migrations, quotas, audit
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Tenants
-- =======================================================================
DEFINE TABLE tenant SCHEMAFULL;
DEFINE FIELD name ON TABLE tenant TYPE string;
DEFINE FIELD slug ON TABLE tenant TYPE string;
DEFINE FIELD schema_name ON TABLE tenant TYPE string;
DEFINE FIELD status ON TABLE tenant TYPE string \
    ASSERT $value IN ['provisioning', 'active', 'suspended', 'migrating', \
    'deleted'];
DEFINE FIELD isolation_level ON TABLE tenant TYPE string \
    ASSERT $value IN ['schema', 'database'];
DEFINE FIELD parent_id ON TABLE tenant TYPE option<string>;
DEFINE FIELD hierarchy_level ON TABLE tenant TYPE string \
    ASSERT $value IN ['organization', 'project', 'team'];
DEFINE FIELD path ON TABLE tenant TYPE string;
DEFINE FIELD tier ON TABLE tenant TYPE string DEFAULT 'standard';
DEFINE FIELD storage_used_bytes ON TABLE tenant TYPE int DEFAULT 0;
DEFINE FIELD last_activity ON TABLE tenant TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_tenant_name ON TABLE tenant COLUMNS name UNIQUE;
DEFINE INDEX idx_tenant_schema_name ON TABLE tenant \
    COLUMNS schema_name UNIQUE;
DEFINE INDEX idx_tenant_parent ON TABLE tenant COLUMNS parent_id;
DEFINE INDEX idx_tenant_status ON TABLE tenant COLUMNS status;

-- =======================================================================
-- Isolation migrations (append-only)
-- =======================================================================
DEFINE TABLE tenant_migration SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE tenant_migration TYPE string;
DEFINE FIELD from_isolation ON TABLE tenant_migration TYPE string \
    ASSERT $value IN ['schema', 'database'];
DEFINE FIELD to_isolation ON TABLE tenant_migration TYPE string \
    ASSERT $value IN ['schema', 'database'];
DEFINE FIELD status ON TABLE tenant_migration TYPE string \
    ASSERT $value IN ['pending', 'replicating', 'verifying', 'cutover', \
    'completed', 'failed', 'rolled_back'];
DEFINE FIELD started_at ON TABLE tenant_migration TYPE datetime;
DEFINE FIELD completed_at ON TABLE tenant_migration \
    TYPE option<datetime>;
DEFINE FIELD rollback_before ON TABLE tenant_migration \
    TYPE option<datetime>;
DEFINE FIELD error_message ON TABLE tenant_migration \
    TYPE option<string>;
DEFINE FIELD created_at ON TABLE tenant_migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_tenant_migration_tenant ON TABLE tenant_migration \
    COLUMNS tenant_id;

-- =======================================================================
-- Per-tenant quota overrides (record id = tenant id)
-- =======================================================================
DEFINE TABLE tenant_quota SCHEMAFULL;
DEFINE FIELD max_storage_bytes ON TABLE tenant_quota TYPE int DEFAULT 0;
DEFINE FIELD max_connections ON TABLE tenant_quota TYPE int DEFAULT 0;
DEFINE FIELD max_qps ON TABLE tenant_quota TYPE float DEFAULT 0.0;
DEFINE FIELD max_children ON TABLE tenant_quota TYPE int DEFAULT 0;
DEFINE FIELD created_at ON TABLE tenant_quota TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE tenant_quota TYPE datetime \
    DEFAULT time::now();

-- =======================================================================
-- Audit log (append-only)
-- =======================================================================
DEFINE TABLE audit_log SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE audit_log TYPE string;
DEFINE FIELD action ON TABLE audit_log TYPE string;
DEFINE FIELD resource ON TABLE audit_log TYPE string;
DEFINE FIELD timestamp ON TABLE audit_log TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_audit_log_tenant ON TABLE audit_log COLUMNS tenant_id;
";

// -----------------------------------------------------------------------
// Schema v2: data-plane session registry read by the activity probe
// -----------------------------------------------------------------------

const SCHEMA_V2: &str = "\
DEFINE TABLE tenant_session SCHEMAFULL;
DEFINE FIELD schema_name ON TABLE tenant_session TYPE string;
DEFINE FIELD state ON TABLE tenant_session TYPE string \
    ASSERT $value IN ['active', 'idle'];
DEFINE FIELD started_at ON TABLE tenant_session TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_tenant_session_schema ON TABLE tenant_session \
    COLUMNS schema_name, state;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let applied: Vec<AppliedMigration> = result.take(0)?;
    let current_version = applied.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS
        .iter()
        .filter(|m| m.version > current_version)
    {
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;
    }

    Ok(())
}

/// Highest migration version this build knows about.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}
