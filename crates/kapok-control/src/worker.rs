//! Bounded migration queue and the worker that drains it.

use std::sync::Arc;

use kapok_core::error::{KapokError, KapokResult};
use kapok_core::models::migration::MigrationRecord;
use kapok_core::models::tenant::IsolationLevel;
use kapok_core::repository::{
    AuditRepository, DatabaseAdmin, MigrationRepository, TenantRepository,
};
use tokio::sync::{Semaphore, mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::migration::MigrationManager;

/// One requested migration.
#[derive(Debug)]
pub struct MigrationJob {
    pub tenant_id: Uuid,
    pub from: IsolationLevel,
    pub to: IsolationLevel,
    /// Receives the `pending` record, or the error that prevented the
    /// migration from starting.
    pub reply: Option<oneshot::Sender<KapokResult<MigrationRecord>>>,
}

/// Sending half of the migration queue.
#[derive(Clone)]
pub struct MigrationQueue {
    sender: mpsc::Sender<MigrationJob>,
}

/// Create a queue holding at most `capacity` jobs not yet picked up.
pub fn migration_queue(capacity: usize) -> (MigrationQueue, mpsc::Receiver<MigrationJob>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (MigrationQueue { sender }, receiver)
}

impl MigrationQueue {
    /// Enqueue without waiting for the migration to start.
    pub fn try_submit(
        &self,
        tenant_id: Uuid,
        from: IsolationLevel,
        to: IsolationLevel,
    ) -> KapokResult<()> {
        self.push(MigrationJob {
            tenant_id,
            from,
            to,
            reply: None,
        })
    }

    /// Enqueue and wait until the worker has created the `pending` record.
    pub async fn submit(
        &self,
        tenant_id: Uuid,
        from: IsolationLevel,
        to: IsolationLevel,
    ) -> KapokResult<MigrationRecord> {
        let (reply, started) = oneshot::channel();
        self.push(MigrationJob {
            tenant_id,
            from,
            to,
            reply: Some(reply),
        })?;

        started.await.map_err(|_| {
            KapokError::QueueUnavailable("migration worker dropped the job".into())
        })?
    }

    fn push(&self, job: MigrationJob) -> KapokResult<()> {
        self.sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(job) => KapokError::QueueUnavailable(format!(
                "queue full, migration for tenant {} not accepted",
                job.tenant_id
            )),
            mpsc::error::TrySendError::Closed(_) => {
                KapokError::QueueUnavailable("migration worker stopped".into())
            }
        })
    }
}

/// Runs queued migrations, at most `max_concurrent` at a time.
pub struct MigrationWorker<T, M, A, D>
where
    T: TenantRepository,
    M: MigrationRepository,
    A: AuditRepository,
    D: DatabaseAdmin,
{
    manager: Arc<MigrationManager<T, M, A, D>>,
    receiver: mpsc::Receiver<MigrationJob>,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

impl<T, M, A, D> MigrationWorker<T, M, A, D>
where
    T: TenantRepository + 'static,
    M: MigrationRepository + 'static,
    A: AuditRepository + 'static,
    D: DatabaseAdmin,
{
    pub fn new(
        manager: Arc<MigrationManager<T, M, A, D>>,
        receiver: mpsc::Receiver<MigrationJob>,
        max_concurrent: usize,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            manager,
            receiver,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Drain the queue until shutdown or until every sender is gone, then
    /// wait for in-flight migrations to finish.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(max_concurrent = self.max_concurrent, "Migration worker started");

        loop {
            let job = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Migration worker shutting down");
                        break;
                    }
                    continue;
                }
                job = self.receiver.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            let Ok(permit) = self.permits.clone().acquire_owned().await else {
                break;
            };
            let manager = self.manager.clone();
            tokio::spawn(async move {
                let _permit = permit;
                process(manager.as_ref(), job).await;
            });
        }

        self.receiver.close();
        let in_flight = u32::try_from(self.max_concurrent).unwrap_or(u32::MAX);
        if self.permits.acquire_many(in_flight).await.is_ok() {
            debug!("In-flight migrations drained");
        }
        info!("Migration worker stopped");
    }
}

async fn process<T, M, A, D>(manager: &MigrationManager<T, M, A, D>, job: MigrationJob)
where
    T: TenantRepository,
    M: MigrationRepository,
    A: AuditRepository,
    D: DatabaseAdmin,
{
    let record = match manager.begin(job.tenant_id, job.from, job.to).await {
        Ok(record) => record,
        Err(e) => {
            match job.reply {
                Some(reply) => {
                    let _ = reply.send(Err(e));
                }
                None => {
                    warn!(tenant_id = %job.tenant_id, error = %e, "Queued migration could not start");
                }
            }
            return;
        }
    };

    if let Some(reply) = job.reply {
        let _ = reply.send(Ok(record.clone()));
    }

    let migration_id = record.id;
    if let Err(e) = manager.run(record).await {
        error!(migration_id = %migration_id, tenant_id = %job.tenant_id, error = %e, "Queued migration failed");
    }
}
