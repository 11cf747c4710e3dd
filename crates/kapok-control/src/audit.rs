use kapok_core::clock::Clock;
use kapok_core::models::audit::CreateAuditLogEntry;
use kapok_core::repository::AuditRepository;
use tracing::error;
use uuid::Uuid;

/// Write an audit entry; failures are logged and swallowed.
pub(crate) async fn record<A: AuditRepository>(
    audit: &A,
    clock: &dyn Clock,
    tenant_id: Uuid,
    action: &str,
    resource: String,
) {
    let entry = CreateAuditLogEntry {
        tenant_id,
        action: action.to_string(),
        resource,
        timestamp: clock.now(),
    };
    if let Err(e) = audit.record(entry).await {
        error!(tenant_id = %tenant_id, action, error = %e, "Failed to write audit entry");
    }
}
