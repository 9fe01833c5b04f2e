use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("member '{0}' not found")]
    NotFound(String),

    #[error("member '{0}' already exists")]
    Duplicate(String),

    #[error("transfer rejected: {0}")]
    ValidationFailed(String),

    #[error("connection failure: {0}")]
    ConnectionFailure(String),

    #[error("resource release failure: {0}")]
    ResourceReleaseFailure(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::ConnectionFailure(err.to_string())
    }
}

impl StoreError {
    /// True for errors of the infrastructure class (pool exhaustion,
    /// unreachable store, statement execution faults).
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::ConnectionFailure(_))
    }
}
