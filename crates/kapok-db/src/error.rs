//! Database-specific error types and conversions.

use kapok_core::error::KapokError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("{entity} already exists")]
    AlreadyExists { entity: String },

    #[error("Malformed row: {0}")]
    Decode(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

impl DbError {
    /// Classify a failed statement: unique-index violations become
    /// [`DbError::AlreadyExists`], anything else a plain query failure.
    pub(crate) fn statement(entity: &str, err: surrealdb::Error) -> Self {
        let message = err.to_string();
        if message.contains("already contains") {
            DbError::AlreadyExists {
                entity: entity.to_string(),
            }
        } else {
            DbError::Query(message)
        }
    }
}

impl From<DbError> for KapokError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => KapokError::NotFound { entity, id },
            DbError::AlreadyExists { entity } => KapokError::AlreadyExists { entity },
            DbError::InvalidIdentifier(name) => {
                KapokError::validation(format!("invalid schema name: {name}"))
            }
            other => KapokError::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kapok_core::error::ErrorKind;

    #[test]
    fn not_found_survives_conversion() {
        let err: KapokError = DbError::NotFound {
            entity: "tenant".into(),
            id: "x".into(),
        }
        .into();
        assert!(err.is_not_found());
    }

    #[test]
    fn decode_failures_are_infrastructure() {
        let err: KapokError = DbError::Decode("bad uuid".into()).into();
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
    }

    #[test]
    fn duplicates_are_invalid_input() {
        let err: KapokError = DbError::AlreadyExists {
            entity: "tenant".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(err.to_string(), "Entity already exists: tenant");
    }

    #[test]
    fn query_failures_do_not_read_as_migrations() {
        let err: KapokError = DbError::Query("parse error".into()).into();
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert!(!err.to_string().contains("Migration"));
    }

    #[test]
    fn bad_identifiers_are_invalid_input() {
        let err: KapokError = DbError::InvalidIdentifier("public".into()).into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
