//! Store error types

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Document store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection-related errors
    #[error("Store connection failed: {0}")]
    ConnectionFailed(String),

    /// Query or pipeline execution errors
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Unique constraint violation
    #[error("Duplicate key in {collection}: {key}")]
    DuplicateKey { collection: String, key: String },

    /// An index with the same name but a different definition exists
    #[error("Index {name} on {collection} already exists with a different definition")]
    IndexConflict { collection: String, name: String },

    /// Index does not exist
    #[error("Index {name} not found on {collection}")]
    IndexNotFound { collection: String, name: String },

    /// Collection or database does not exist
    #[error("Namespace not found: {0}")]
    NamespaceNotFound(String),

    /// Transaction errors (conflicts, finalized handles)
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// A stored document could not be decoded into the requested shape
    #[error("Failed to decode document {id} in {collection}: {source}")]
    Decode {
        collection: String,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// Failure raised by a configured fault (testing aid)
    #[error("Injected fault on {0}")]
    Injected(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether the error means "the thing to create is already there"
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::IndexConflict { .. } | StoreError::DuplicateKey { .. })
    }

    /// Whether the error means "the thing to remove is already gone"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::IndexNotFound { .. } | StoreError::NamespaceNotFound(_)
        )
    }

    /// Get error code for reports
    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::ConnectionFailed(_) => "CONNECTION_ERROR",
            StoreError::QueryFailed(_) => "QUERY_ERROR",
            StoreError::DuplicateKey { .. } => "DUPLICATE_KEY",
            StoreError::IndexConflict { .. } => "INDEX_CONFLICT",
            StoreError::IndexNotFound { .. } => "INDEX_NOT_FOUND",
            StoreError::NamespaceNotFound(_) => "NAMESPACE_NOT_FOUND",
            StoreError::TransactionFailed(_) => "TRANSACTION_ERROR",
            StoreError::Decode { .. } => "DECODE_ERROR",
            _ => "STORE_ERROR",
        }
    }
}
