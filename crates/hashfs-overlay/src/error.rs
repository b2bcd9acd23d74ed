//! Error types for the overlay.

use hashfs_store::StoreError;
use thiserror::Error;

/// Result type alias for overlay operations.
pub type FsResult<T> = Result<T, FsError>;

/// Error variants for overlay operations.
#[derive(Debug, Error)]
pub enum FsError {
    /// The directory is not present in the index.
    #[error("directory {0:?} not found")]
    DirNotFound(String),

    /// The file is not present in the index or the backing store.
    #[error("object {0:?} not found")]
    ObjectNotFound(String),

    /// The path names a directory where a file was expected.
    #[error("{0:?} is a directory")]
    IsDirectory(String),

    /// The destination directory already exists.
    #[error("directory {0:?} already exists")]
    DirExists(String),

    /// The directory still has files or child directories.
    #[error("directory {0:?} not empty")]
    DirNotEmpty(String),

    /// The backing store lacks an optional capability this operation needs.
    #[error("capability not supported: {0}")]
    Unsupported(&'static str),

    /// Index state for the directory is unreadable or corrupt. Never
    /// silently repaired; the node refuses further mutation.
    #[error("directory {path:?} in a bad state, refusing to modify: {reason}")]
    BadState {
        /// Logical path of the affected directory.
        path: String,
        /// What went wrong reading or decoding its index.
        reason: String,
    },

    /// The name would break the line-oriented persisted index format.
    #[error("name may not contain newline: {0:?}")]
    InvalidName(String),

    /// The configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An error from the backing store, propagated unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FsError {
    pub(crate) fn bad_state(path: impl Into<String>, reason: impl ToString) -> Self {
        FsError::BadState {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
