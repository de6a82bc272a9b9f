use thiserror::Error;

/// Failures reported by a [`crate::store::DocumentStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    #[error("document {0} not found")]
    NotFound(String),
    #[error("document {path} is malformed: {reason}")]
    Corrupt { path: String, reason: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("a profile named '{0}' already exists")]
    DuplicateName(String),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
