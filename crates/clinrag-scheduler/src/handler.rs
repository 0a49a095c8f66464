//! Pluggable task execution. The scheduler itself knows nothing about
//! ingestion, embedding, or any other domain operation — a composition root
//! registers one `TaskHandler` per `task_kind`, and `submit` stays generic
//! over `(task_kind, payload)`.

use async_trait::async_trait;
use clinrag_common::ErrorKind;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    pub kind: ErrorKind,
    pub message: String,
}

impl HandlerError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, payload: Value) -> Result<(), HandlerError>;
}
