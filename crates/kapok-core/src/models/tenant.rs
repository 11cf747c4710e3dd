//! Tenant domain model.
//!
//! A tenant owns one isolated slice of storage: either a schema inside
//! the shared database or a dedicated database. Tenants form a tree of at
//! most [`MAX_HIERARCHY_DEPTH`] levels (organization → project → team)
//! encoded as a materialized path of the form `/rootId/.../selfId`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{KapokError, KapokResult};

pub const MIN_TENANT_NAME_LENGTH: usize = 3;
pub const MAX_TENANT_NAME_LENGTH: usize = 50;

/// Maximum number of segments in a tenant's materialized path.
pub const MAX_HIERARCHY_DEPTH: usize = 3;

pub const DEFAULT_TIER: &str = "standard";

const SCHEMA_PREFIX: &str = "tenant_";
const DATABASE_PREFIX: &str = "kapok_tenant_";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Provisioning,
    Active,
    Suspended,
    Migrating,
    Deleted,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Provisioning => "provisioning",
            TenantStatus::Active => "active",
            TenantStatus::Suspended => "suspended",
            TenantStatus::Migrating => "migrating",
            TenantStatus::Deleted => "deleted",
        }
    }
}

impl FromStr for TenantStatus {
    type Err = KapokError;

    fn from_str(s: &str) -> KapokResult<Self> {
        match s {
            "provisioning" => Ok(TenantStatus::Provisioning),
            "active" => Ok(TenantStatus::Active),
            "suspended" => Ok(TenantStatus::Suspended),
            "migrating" => Ok(TenantStatus::Migrating),
            "deleted" => Ok(TenantStatus::Deleted),
            other => Err(KapokError::validation(format!(
                "invalid tenant status: {other}"
            ))),
        }
    }
}

impl fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical isolation strategy for a tenant's data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// A schema inside the shared database.
    Schema,
    /// A dedicated database with its own connection pool.
    Database,
}

impl IsolationLevel {
    pub const ALL: [IsolationLevel; 2] = [IsolationLevel::Schema, IsolationLevel::Database];

    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationLevel::Schema => "schema",
            IsolationLevel::Database => "database",
        }
    }
}

impl FromStr for IsolationLevel {
    type Err = KapokError;

    fn from_str(s: &str) -> KapokResult<Self> {
        match s {
            "schema" => Ok(IsolationLevel::Schema),
            "database" => Ok(IsolationLevel::Database),
            other => Err(KapokError::validation(format!(
                "unknown isolation strategy: {other}"
            ))),
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyLevel {
    Organization,
    Project,
    Team,
}

impl HierarchyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            HierarchyLevel::Organization => "organization",
            HierarchyLevel::Project => "project",
            HierarchyLevel::Team => "team",
        }
    }

    /// Level assigned to children of a tenant at this level, if any.
    pub fn child(&self) -> Option<HierarchyLevel> {
        match self {
            HierarchyLevel::Organization => Some(HierarchyLevel::Project),
            HierarchyLevel::Project => Some(HierarchyLevel::Team),
            HierarchyLevel::Team => None,
        }
    }
}

impl FromStr for HierarchyLevel {
    type Err = KapokError;

    fn from_str(s: &str) -> KapokResult<Self> {
        match s {
            "organization" => Ok(HierarchyLevel::Organization),
            "project" => Ok(HierarchyLevel::Project),
            "team" => Ok(HierarchyLevel::Team),
            other => Err(KapokError::validation(format!(
                "invalid hierarchy level: {other}"
            ))),
        }
    }
}

impl fmt::Display for HierarchyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tenant of the platform.
///
/// `id` and `schema_name` never change after creation. `status` is
/// `Migrating` only while a migration for this tenant is in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    /// Display name, 3–50 characters of `[A-Za-z0-9_-]`.
    pub name: String,
    /// URL-safe form of the name.
    pub slug: String,
    /// Derived from `id` by [`generate_schema_name`].
    pub schema_name: String,
    pub status: TenantStatus,
    pub isolation_level: IsolationLevel,
    pub parent_id: Option<Uuid>,
    pub hierarchy_level: HierarchyLevel,
    /// Materialized ancestor chain, `/rootId/.../selfId`.
    pub path: String,
    /// Resource-ceiling profile used by threshold evaluation.
    pub tier: String,
    pub storage_used_bytes: u64,
    pub last_activity: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Number of segments in the tenant's path.
    pub fn depth(&self) -> usize {
        path_depth(&self.path)
    }

    pub fn validate(&self) -> KapokResult<()> {
        if self.id.is_nil() {
            return Err(KapokError::validation("tenant ID is required"));
        }
        validate_name(&self.name)?;
        if self.schema_name.is_empty() {
            return Err(KapokError::validation("schema name is required"));
        }
        if self.depth() > MAX_HIERARCHY_DEPTH {
            return Err(KapokError::HierarchyDepthExceeded {
                max: MAX_HIERARCHY_DEPTH,
            });
        }
        Ok(())
    }
}

/// Fields required to insert a tenant metadata row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTenant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub schema_name: String,
    pub status: TenantStatus,
    pub isolation_level: IsolationLevel,
    pub parent_id: Option<Uuid>,
    pub hierarchy_level: HierarchyLevel,
    pub path: String,
    pub tier: String,
    pub created_at: DateTime<Utc>,
}

/// Check a tenant display name against the naming rules.
pub fn validate_name(name: &str) -> KapokResult<()> {
    let len = name.chars().count();
    if len < MIN_TENANT_NAME_LENGTH {
        return Err(KapokError::validation(format!(
            "tenant name must be at least {MIN_TENANT_NAME_LENGTH} characters"
        )));
    }
    if len > MAX_TENANT_NAME_LENGTH {
        return Err(KapokError::validation(format!(
            "tenant name cannot exceed {MAX_TENANT_NAME_LENGTH} characters"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(KapokError::validation(
            "tenant name can only contain alphanumeric characters, hyphens, and underscores",
        ));
    }
    Ok(())
}

/// Lowercase the name, turn spaces into dashes, drop everything outside
/// `[a-z0-9-]` and collapse dash runs.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.to_lowercase().replace(' ', "-").chars() {
        if !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
            continue;
        }
        if c == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(c);
    }
    slug.trim_matches('-').to_string()
}

/// Schema name for a tenant: `tenant_` followed by the identifier with
/// hyphens replaced by underscores.
pub fn generate_schema_name(tenant_id: &Uuid) -> String {
    format!("{SCHEMA_PREFIX}{}", tenant_id.to_string().replace('-', "_"))
}

/// Name of the dedicated database used under database isolation.
pub fn database_name(tenant_id: &Uuid) -> String {
    format!("{DATABASE_PREFIX}{}", tenant_id.to_string().replace('-', "_"))
}

/// Identifier check applied before any DDL.
///
/// Accepts `tenant_`/`kapok_tenant_` prefixed names made of ASCII
/// alphanumerics, underscores and hyphens. The bare prefix is accepted.
pub fn is_valid_schema_name(name: &str) -> bool {
    let rest = match name
        .strip_prefix(DATABASE_PREFIX)
        .or_else(|| name.strip_prefix(SCHEMA_PREFIX))
    {
        Some(rest) => rest,
        None => return false,
    };
    rest.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub fn root_path(id: &Uuid) -> String {
    format!("/{id}")
}

pub fn child_path(parent_path: &str, id: &Uuid) -> String {
    format!("{}/{id}", parent_path.trim_end_matches('/'))
}

/// Path segments from root to self.
pub fn path_segments(path: &str) -> Vec<&str> {
    path.trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn path_depth(path: &str) -> usize {
    path_segments(path).len()
}

/// Ancestor identifiers encoded in a path, root first, excluding self.
pub fn ancestor_ids(path: &str) -> KapokResult<Vec<Uuid>> {
    let segments = path_segments(path);
    let Some((_, ancestors)) = segments.split_last() else {
        return Ok(Vec::new());
    };
    ancestors
        .iter()
        .map(|s| {
            Uuid::parse_str(s)
                .map_err(|e| KapokError::Database(format!("invalid path segment {s}: {e}")))
        })
        .collect()
}
