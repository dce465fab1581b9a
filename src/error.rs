use thiserror::Error;

/// Main error type for Sixgraph
#[derive(Error, Debug)]
pub enum SixgraphError {
    /// Graph store or content store errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A store call exceeded its request-scoped deadline
    #[error("Timed out after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    /// The blocking task running a store session died
    #[error("Store task failed: {0}")]
    Task(String),

    /// The server-side aggregated post query could not run
    #[error("Aggregated query unavailable: {0}")]
    AggregationUnavailable(String),

    /// JSON encoding of query parameters failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SixgraphError {
    /// True for failures of the underlying stores (unreachable, busy, timed out).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SixgraphError::Database(_) | SixgraphError::Timeout { .. } | SixgraphError::Task(_)
        )
    }
}

/// Convenient Result type using SixgraphError
pub type Result<T> = std::result::Result<T, SixgraphError>;
