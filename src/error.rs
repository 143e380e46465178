use thiserror::Error;

pub type FinderResult<T> = std::result::Result<T, FinderError>;

#[derive(Debug, Error)]
pub enum FinderError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid filter: {0}")]
    InvalidCriterion(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl FinderError {
    /// Not-found and permission failures end the command; everything else is
    /// reported inline.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FinderError::NotFound(_) | FinderError::PermissionDenied(_))
    }
}
