//! Kapok Server: control-plane entry point.

use std::sync::Arc;

use kapok_control::{ControlConfig, ControlPlane, Repositories, SkipVerification};
use kapok_core::SystemClock;
use kapok_db::repository::{
    SurrealActivityProbe, SurrealAuditRepository, SurrealMigrationRepository,
    SurrealQuotaRepository, SurrealTenantRepository,
};
use kapok_db::{DbConfig, DbManager};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("kapok=info".parse()?))
        .json()
        .init();

    tracing::info!("Starting Kapok control plane...");

    let db_config = DbConfig::from_env();
    let config = ControlConfig::from_env();

    let db = DbManager::connect(&db_config).await?;
    kapok_db::run_migrations(db.client()).await?;

    let client = db.client().clone();
    let repos = Repositories {
        tenants: SurrealTenantRepository::new(client.clone()),
        migrations: SurrealMigrationRepository::new(client.clone()),
        quotas: SurrealQuotaRepository::new(client.clone()),
        audit: SurrealAuditRepository::new(client.clone()),
    };
    let (plane, worker) = ControlPlane::build(
        repos,
        db.admin(),
        SurrealActivityProbe::new(client),
        Arc::new(SkipVerification),
        Arc::new(SystemClock),
        config,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_task = tokio::spawn(worker.run(shutdown_rx.clone()));
    let engine = plane.engine.clone();
    let engine_task = tokio::spawn(async move { engine.run(shutdown_rx).await });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);

    for (name, task) in [("engine", engine_task), ("worker", worker_task)] {
        if let Err(e) = task.await {
            tracing::error!(task = name, error = %e, "Background task ended abnormally");
        }
    }
    plane.pools.close_all().await;

    tracing::info!("Kapok control plane stopped.");
    Ok(())
}
