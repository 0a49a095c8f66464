use clinrag_common::ErrorKind;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("storage: {0}")]
    Storage(#[from] clinrag_db::DbError),
    #[error("no handler registered for task kind '{0}'")]
    HandlerNotFound(String),
    #[error("job {0} not found")]
    NotFound(Uuid),
    #[error("invalid cron expression: {0}")]
    InvalidCron(String),
}

impl SchedulerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchedulerError::Storage(e) => e.kind(),
            SchedulerError::HandlerNotFound(_) | SchedulerError::NotFound(_) | SchedulerError::InvalidCron(_) => {
                ErrorKind::Internal
            }
        }
    }
}
