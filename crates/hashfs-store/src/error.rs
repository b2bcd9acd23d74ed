//! Error types for the backing-store contract.

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error variants for backing-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested object or container does not exist.
    #[error("not found: {key}")]
    NotFound {
        /// The key that was not found.
        key: String,
    },

    /// The backend does not implement the named optional capability.
    #[error("capability not supported: {0}")]
    Unsupported(&'static str),

    /// The operation context was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// The operation context's deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Wraps standard I/O errors from payload streaming.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend-specific failure.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Convenience constructor for [`StoreError::NotFound`].
    pub fn not_found(key: impl Into<String>) -> Self {
        StoreError::NotFound { key: key.into() }
    }

    /// True if this error means the target was already absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
