use clinrag_common::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum KbError {
    #[error("lancedb: {0}")]
    LanceDb(String),
    #[error("arrow: {0}")]
    Arrow(String),
    #[error("invalid embedding dimension: expected {expected}, got {actual}")]
    InvalidEmbeddingDimension { expected: usize, actual: usize },
    #[error("table not initialized")]
    NotInitialized,
    #[error("chunk not found")]
    NotFound,
}

impl KbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KbError::InvalidEmbeddingDimension { .. } => ErrorKind::InputRejected,
            KbError::NotFound => ErrorKind::Internal,
            KbError::LanceDb(_) | KbError::Arrow(_) | KbError::NotInitialized => ErrorKind::Storage,
        }
    }
}

impl From<lancedb::Error> for KbError {
    fn from(e: lancedb::Error) -> Self {
        KbError::LanceDb(e.to_string())
    }
}

impl From<arrow_schema::ArrowError> for KbError {
    fn from(e: arrow_schema::ArrowError) -> Self {
        KbError::Arrow(e.to_string())
    }
}
