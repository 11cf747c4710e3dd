//! Error types for the Kapok control plane.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KapokError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Tenant isolation is {actual}, not {expected}")]
    IsolationMismatch { expected: String, actual: String },

    #[error("Migration {id} is {status}; operation requires {required}")]
    InvalidMigrationState {
        id: String,
        status: String,
        required: String,
    },

    #[error("Rollback window for migration {id} expired at {deadline}")]
    RollbackWindowExpired { id: String, deadline: DateTime<Utc> },

    #[error("Quota exceeded for tenant {tenant_id}: {reason}")]
    QuotaExceeded { tenant_id: String, reason: String },

    #[error("Maximum hierarchy depth ({max}) reached")]
    HierarchyDepthExceeded { max: usize },

    #[error("Provisioning failed: {0}")]
    Provisioning(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used by boundary layers to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Infrastructure,
}

impl KapokError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KapokError::NotFound { .. } => ErrorKind::NotFound,
            KapokError::AlreadyExists { .. }
            | KapokError::Validation { .. }
            | KapokError::IsolationMismatch { .. }
            | KapokError::InvalidMigrationState { .. }
            | KapokError::RollbackWindowExpired { .. }
            | KapokError::QuotaExceeded { .. }
            | KapokError::HierarchyDepthExceeded { .. } => ErrorKind::InvalidInput,
            KapokError::Provisioning(_)
            | KapokError::Database(_)
            | KapokError::QueueUnavailable(_)
            | KapokError::Internal(_) => ErrorKind::Infrastructure,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        KapokError::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        KapokError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, KapokError::NotFound { .. })
    }
}

pub type KapokResult<T> = Result<T, KapokError>;
