//! CLI errors
//!
//! Engine failures pass through with their own `RQ_*` code so scripts see
//! the same codes the library returns. Failures that only exist at the
//! command line (configuration, stdin/stdout, request shape, module lookup)
//! carry `RQ_CLI_*` codes.

use std::io;

use thiserror::Error;

use crate::errors::QueryError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("RQ_CLI_CONFIG_ERROR: {0}")]
    Config(String),

    #[error("RQ_CLI_IO_ERROR: {0}")]
    Io(String),

    /// Request on stdin is not valid JSON or has the wrong shape
    #[error("RQ_CLI_BAD_REQUEST: {0}")]
    BadRequest(String),

    /// `--module` matches no module id or handle
    #[error("RQ_CLI_MODULE_NOT_FOUND: no module with id or handle {0:?}")]
    ModuleNotFound(String),

    #[error("{}: {0}", .0.code())]
    Query(QueryError),
}

impl CliError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        CliError::Config(msg.into())
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        CliError::Io(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        CliError::BadRequest(msg.into())
    }

    pub fn module_not_found(module: &str) -> Self {
        CliError::ModuleNotFound(module.to_string())
    }

    /// Stable code written to the `code` field of error responses
    pub fn code_str(&self) -> &'static str {
        match self {
            CliError::Config(_) => "RQ_CLI_CONFIG_ERROR",
            CliError::Io(_) => "RQ_CLI_IO_ERROR",
            CliError::BadRequest(_) => "RQ_CLI_BAD_REQUEST",
            CliError::ModuleNotFound(_) => "RQ_CLI_MODULE_NOT_FOUND",
            CliError::Query(e) => e.code(),
        }
    }

    /// Human readable message without the code prefix
    pub fn message(&self) -> String {
        match self {
            CliError::Config(m) | CliError::Io(m) | CliError::BadRequest(m) => m.clone(),
            CliError::ModuleNotFound(m) => format!("no module with id or handle {:?}", m),
            CliError::Query(e) => e.to_string(),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            CliError::Io(e.to_string())
        } else {
            CliError::BadRequest(format!("invalid JSON: {}", e))
        }
    }
}

impl From<QueryError> for CliError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::Config(msg) => CliError::Config(msg),
            other => CliError::Query(other),
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_errors_keep_their_code() {
        let err = CliError::from(QueryError::UnknownField("doesNotExist".into()));
        assert_eq!(err.code_str(), "RQ_UNKNOWN_FIELD");
        assert!(err.message().contains("doesNotExist"));
        assert!(err.to_string().starts_with("RQ_UNKNOWN_FIELD: "));
    }

    #[test]
    fn test_config_errors_map_to_cli_code() {
        let err = CliError::from(QueryError::Config("bad journal_mode".into()));
        assert_eq!(err.code_str(), "RQ_CLI_CONFIG_ERROR");
        assert_eq!(err.to_string(), "RQ_CLI_CONFIG_ERROR: bad journal_mode");
    }

    #[test]
    fn test_malformed_json_is_bad_request() {
        let err: CliError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert_eq!(err.code_str(), "RQ_CLI_BAD_REQUEST");
        assert!(err.message().starts_with("invalid JSON"));
    }
}
