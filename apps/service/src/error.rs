use deadpool::managed::PoolError;
use thiserror::Error;

/// Network level failure of a probe. Non-2xx responses are never errors.
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    #[error("Request timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("Connection failed after {elapsed_ms}ms: {message}")]
    Connection { elapsed_ms: u64, message: String },
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database query failed: {0}")]
    Query(#[from] libsql::Error),

    #[error("Failed to get a database connection: {0}")]
    Pool(#[from] PoolError<libsql::Error>),

    #[error("Storage write timed out after {0}ms")]
    Timeout(u64),

    #[error("Malformed row: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Endpoint {0} not found")]
    EndpointNotFound(i64),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
