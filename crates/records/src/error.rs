use thiserror::Error;

/// Result type for record store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the record stores
#[derive(Error, Debug)]
pub enum StoreError {
    /// Malformed input to a mutating operation; nothing was written
    #[error("Validation error: {0}")]
    Validation(String),

    /// Group index outside the current normalized list
    #[error("Group index {index} out of range (len {len})")]
    IndexOutOfRange { index: i64, len: usize },

    /// Host has no container with this name
    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    /// World-info group id not present in the book
    #[error("Group not found: {0}")]
    GroupNotFound(String),

    /// Host read/write failed
    #[error("Host error: {0}")]
    Host(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a host error
    pub fn host(msg: impl Into<String>) -> Self {
        Self::Host(msg.into())
    }

    /// Out-of-range error for a `usize` index
    pub fn index(index: usize, len: usize) -> Self {
        Self::IndexOutOfRange {
            index: i64::try_from(index).unwrap_or(i64::MAX),
            len,
        }
    }
}
