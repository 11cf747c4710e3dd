//! Registry of dedicated per-tenant connections.

use std::collections::HashMap;

use kapok_core::repository::TenantConnection;
use parking_lot::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// Thread-safe map from tenant id to its dedicated connection.
///
/// Holds at most one connection per tenant. Locks are released before
/// any connection is closed.
pub struct PoolRegistry<H: TenantConnection> {
    pools: RwLock<HashMap<Uuid, H>>,
}

impl<H: TenantConnection> Default for PoolRegistry<H> {
    fn default() -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
        }
    }
}

impl<H: TenantConnection> PoolRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` for `tenant_id`, returning the handle it
    /// displaced. The caller owns closing a displaced handle.
    pub fn set(&self, tenant_id: Uuid, handle: H) -> Option<H> {
        let previous = self.pools.write().insert(tenant_id, handle);
        if previous.is_some() {
            warn!(tenant_id = %tenant_id, "Replaced existing tenant connection");
        }
        previous
    }

    pub fn get(&self, tenant_id: &Uuid) -> Option<H> {
        self.pools.read().get(tenant_id).cloned()
    }

    /// Unregister and close one connection. Close errors are logged.
    /// Returns whether an entry existed.
    pub async fn remove(&self, tenant_id: &Uuid) -> bool {
        let removed = self.pools.write().remove(tenant_id);
        let Some(handle) = removed else {
            return false;
        };
        if let Err(e) = handle.close().await {
            warn!(tenant_id = %tenant_id, error = %e, "Failed to close tenant connection");
        }
        true
    }

    /// Close every registered connection and empty the registry.
    pub async fn close_all(&self) {
        let drained: Vec<(Uuid, H)> = self.pools.write().drain().collect();
        let count = drained.len();
        for (tenant_id, handle) in drained {
            if let Err(e) = handle.close().await {
                warn!(tenant_id = %tenant_id, error = %e, "Failed to close tenant connection");
            }
        }
        info!(count, "Closed all tenant connections");
    }

    pub fn count(&self) -> usize {
        self.pools.read().len()
    }
}
