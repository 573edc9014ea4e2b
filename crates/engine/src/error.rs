use grouping_records::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    /// The live view rejected a read or a structural write
    #[error("View error: {0}")]
    View(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The runtime task is gone
    #[error("Engine runtime has shut down")]
    Shutdown,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    pub fn view(msg: impl Into<String>) -> Self {
        Self::View(msg.into())
    }
}
