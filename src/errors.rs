//! Error types for the record query engine
//!
//! Every failure surfaced by the engine is one of these kinds. Nothing is
//! retried here; retries belong to whoever owns the connection.
//!
//! Error codes:
//! - RQ_UNKNOWN_FIELD
//! - RQ_SYNTAX_ERROR
//! - RQ_TYPE_MISMATCH
//! - RQ_INVALID_CURSOR
//! - RQ_NOT_UNIQUE
//! - RQ_NOT_SUPPORTED
//! - RQ_NOT_FOUND
//! - RQ_CANCELLED
//! - RQ_CONFIG_ERROR
//! - RQ_STORAGE_ERROR

use rusqlite::ffi;
use thiserror::Error;

/// Result type for engine operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Engine errors
#[derive(Debug, Error)]
pub enum QueryError {
    /// Identifier is not a system column nor a field of the module,
    /// or module/namespace ids disagree between arguments
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// Malformed filter or sort text
    #[error("Syntax error at position {position}: {message}")]
    SyntaxError { position: usize, message: String },

    /// Operator or literal not supported for the field type
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Cursor token could not be decoded or does not fit the query
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// Unique constraint violated on create/upsert
    #[error("Not unique: {0}")]
    NotUnique(String),

    /// Operation intentionally not implemented
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Record not found
    #[error("Record {0} not found")]
    NotFound(u64),

    /// Query aborted by cancellation or deadline
    #[error("Query cancelled")]
    Cancelled,

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Underlying storage failure
    #[error("Storage error: {0}")]
    Storage(#[source] rusqlite::Error),
}

impl QueryError {
    /// Create a syntax error at a byte offset
    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        QueryError::SyntaxError {
            position,
            message: message.into(),
        }
    }

    /// Stable string code
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::UnknownField(_) => "RQ_UNKNOWN_FIELD",
            QueryError::SyntaxError { .. } => "RQ_SYNTAX_ERROR",
            QueryError::TypeMismatch(_) => "RQ_TYPE_MISMATCH",
            QueryError::InvalidCursor(_) => "RQ_INVALID_CURSOR",
            QueryError::NotUnique(_) => "RQ_NOT_UNIQUE",
            QueryError::NotSupported(_) => "RQ_NOT_SUPPORTED",
            QueryError::NotFound(_) => "RQ_NOT_FOUND",
            QueryError::Cancelled => "RQ_CANCELLED",
            QueryError::Config(_) => "RQ_CONFIG_ERROR",
            QueryError::Storage(_) => "RQ_STORAGE_ERROR",
        }
    }

    /// Returns true when the caller sent something the engine rejects,
    /// as opposed to a storage or runtime failure
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            QueryError::Storage(_) | QueryError::Cancelled | QueryError::Config(_)
        )
    }
}

impl From<rusqlite::Error> for QueryError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref failure, ref msg) = err {
            match failure.code {
                ffi::ErrorCode::OperationInterrupted => return QueryError::Cancelled,
                ffi::ErrorCode::ConstraintViolation
                    if failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                        || failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    return QueryError::NotUnique(
                        msg.clone().unwrap_or_else(|| "constraint violation".to_string()),
                    );
                }
                _ => {}
            }
        }

        QueryError::Storage(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            QueryError::UnknownField("x".into()).code(),
            "RQ_UNKNOWN_FIELD"
        );
        assert_eq!(QueryError::syntax(3, "oops").code(), "RQ_SYNTAX_ERROR");
        assert_eq!(QueryError::Cancelled.code(), "RQ_CANCELLED");
        assert_eq!(
            QueryError::NotSupported("partial".into()).code(),
            "RQ_NOT_SUPPORTED"
        );
    }

    #[test]
    fn test_interrupt_maps_to_cancelled() {
        let err = rusqlite::Error::SqliteFailure(
            ffi::Error::new(ffi::SQLITE_INTERRUPT),
            Some("interrupted".into()),
        );
        assert!(matches!(QueryError::from(err), QueryError::Cancelled));
    }

    #[test]
    fn test_primary_key_violation_maps_to_not_unique() {
        let err = rusqlite::Error::SqliteFailure(
            ffi::Error::new(ffi::SQLITE_CONSTRAINT_PRIMARYKEY),
            Some("UNIQUE constraint failed: compose_record.id".into()),
        );
        assert!(matches!(QueryError::from(err), QueryError::NotUnique(_)));
    }

    #[test]
    fn test_client_errors() {
        assert!(QueryError::InvalidCursor("bad".into()).is_client_error());
        assert!(!QueryError::Cancelled.is_client_error());
    }

    #[test]
    fn test_display() {
        let err = QueryError::syntax(7, "unexpected token");
        assert_eq!(
            err.to_string(),
            "Syntax error at position 7: unexpected token"
        );
    }
}
