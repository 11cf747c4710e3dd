//! SurrealDB repository implementations.

mod activity;
mod audit;
mod migration;
mod quota;
mod tenant;

use std::str::FromStr;

use kapok_core::error::KapokError;
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

pub use activity::SurrealActivityProbe;
pub use audit::SurrealAuditRepository;
pub use migration::SurrealMigrationRepository;
pub use quota::SurrealQuotaRepository;
pub use tenant::SurrealTenantRepository;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_uuid(s: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(s).map_err(|e| DbError::Decode(format!("invalid UUID {s}: {e}")))
}

/// Parse a stored enum string through the model's `FromStr`.
fn parse_enum<T>(s: &str) -> Result<T, DbError>
where
    T: FromStr<Err = KapokError>,
{
    s.parse().map_err(|e: KapokError| DbError::Decode(e.to_string()))
}
