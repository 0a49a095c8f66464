use clinrag_common::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not found")]
    NotFound,
    #[error("invalid task payload: {0}")]
    InvalidPayload(String),
}

impl DbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::NotFound => ErrorKind::Internal,
            DbError::InvalidPayload(_) => ErrorKind::InputRejected,
            DbError::Sqlx(_) | DbError::Serialization(_) => ErrorKind::Storage,
        }
    }
}
