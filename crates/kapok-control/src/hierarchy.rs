//! Materialized-path tenant tree queries.

use std::collections::HashMap;

use kapok_core::error::{KapokError, KapokResult};
use kapok_core::models::tenant::{MAX_HIERARCHY_DEPTH, Tenant, ancestor_ids, path_depth};
use kapok_core::repository::TenantRepository;
use uuid::Uuid;

/// Reject a child under a parent whose path already has the maximum
/// number of segments.
pub fn check_depth(parent: &Tenant) -> KapokResult<()> {
    if path_depth(&parent.path) >= MAX_HIERARCHY_DEPTH {
        return Err(KapokError::HierarchyDepthExceeded {
            max: MAX_HIERARCHY_DEPTH,
        });
    }
    Ok(())
}

pub struct HierarchyManager<T: TenantRepository> {
    tenants: T,
}

impl<T: TenantRepository> HierarchyManager<T> {
    pub fn new(tenants: T) -> Self {
        Self { tenants }
    }

    /// Direct children, oldest first.
    pub async fn get_children(&self, parent_id: Uuid) -> KapokResult<Vec<Tenant>> {
        self.tenants.list_children(parent_id).await
    }

    /// Ancestors of a tenant in path order (root first), excluding the
    /// tenant itself.
    pub async fn get_ancestors(&self, tenant_id: Uuid) -> KapokResult<Vec<Tenant>> {
        let tenant = self.tenants.get_by_id(tenant_id).await?;
        let ids = ancestor_ids(&tenant.path)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_id: HashMap<Uuid, Tenant> = self
            .tenants
            .list_by_ids(&ids)
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();

        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    /// Every tenant below `tenant_id`, ordered by path.
    pub async fn get_subtree(&self, tenant_id: Uuid) -> KapokResult<Vec<Tenant>> {
        let tenant = self.tenants.get_by_id(tenant_id).await?;
        let mut descendants = self.tenants.list_descendants(&tenant.path).await?;
        descendants.retain(|t| t.id != tenant_id);
        descendants.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(descendants)
    }

    pub async fn validate_depth(&self, parent_id: Uuid) -> KapokResult<()> {
        let parent = self.tenants.get_by_id(parent_id).await?;
        check_depth(&parent)
    }

    pub async fn count_children(&self, parent_id: Uuid) -> KapokResult<u64> {
        self.tenants.count_children(parent_id).await
    }
}
