//! Error types for table profiling

use thiserror::Error;
use tokio_postgres::error::SqlState;

pub type Result<T> = std::result::Result<T, ProfilerError>;

#[derive(Error, Debug)]
pub enum ProfilerError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Scan error: {0}")]
    Scan(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Logging error: {0}")]
    Logging(String),
}

impl ProfilerError {
    /// Whether the error means a referenced table or column is missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProfilerError::NotFound(_))
    }

    /// Whether the error came from a failed DDL statement
    pub fn is_schema(&self) -> bool {
        matches!(self, ProfilerError::Schema(_))
    }
}

impl From<tokio_postgres::Error> for ProfilerError {
    fn from(err: tokio_postgres::Error) -> Self {
        if err.is_closed() {
            return ProfilerError::Connection(err.to_string());
        }

        let message = match err.as_db_error() {
            Some(db_err) => db_err.message().to_string(),
            None => err.to_string(),
        };

        match err.code() {
            Some(code)
                if *code == SqlState::UNDEFINED_TABLE || *code == SqlState::UNDEFINED_COLUMN =>
            {
                ProfilerError::NotFound(message)
            }
            // Unknown column types surface as undefined_object (42704)
            Some(code)
                if *code == SqlState::DUPLICATE_TABLE
                    || *code == SqlState::DUPLICATE_COLUMN
                    || *code == SqlState::UNDEFINED_OBJECT =>
            {
                ProfilerError::Schema(message)
            }
            Some(code) if code.code().starts_with("08") => ProfilerError::Connection(message),
            _ => ProfilerError::Query(message),
        }
    }
}

impl From<config::ConfigError> for ProfilerError {
    fn from(err: config::ConfigError) -> Self {
        ProfilerError::Configuration(err.to_string())
    }
}
