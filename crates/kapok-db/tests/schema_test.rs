//! Integration tests for control-table migrations using in-memory
//! SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    kapok_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    let info_str = format!("{:?}", info);

    for table in [
        "tenant",
        "tenant_migration",
        "tenant_quota",
        "audit_log",
        "tenant_session",
        "_migration",
    ] {
        assert!(info_str.contains(table), "missing {table} table");
    }
}

#[tokio::test]
async fn migration_is_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    kapok_db::run_migrations(&db).await.unwrap();
    kapok_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("SELECT * FROM _migration").await.unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(
        records.len(),
        kapok_db::latest_version() as usize,
        "expected one record per migration"
    );
}

#[tokio::test]
async fn tenant_status_is_constrained() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    kapok_db::run_migrations(&db).await.unwrap();

    let result = db
        .query(
            "CREATE tenant SET name = 'bad', slug = 'bad', \
             schema_name = 'tenant_bad', status = 'exploded', \
             isolation_level = 'schema', hierarchy_level = 'organization', \
             path = '/bad', tier = 'standard'",
        )
        .await
        .unwrap();
    assert!(result.check().is_err(), "unknown status should be rejected");
}
