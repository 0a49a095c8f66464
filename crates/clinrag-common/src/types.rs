//! Core domain types shared across the ingestion, KB, and RAG crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorKind;

/// Where a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSource {
    Upload,
    PubMed,
}

impl DocumentSource {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentSource::Upload => "upload",
            DocumentSource::PubMed => "pubmed",
        }
    }
}

/// A logical source unit: one uploaded file or one fetched article.
/// Created on ingest submission; a matching content hash makes resubmission
/// idempotent. Destroyed only by explicit delete, cascading to all derived
/// chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub filename: String,
    pub content_hash: String,
    pub byte_length: i64,
    pub source: DocumentSource,
    pub category: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub total_pages: i32,
    pub indexed_chunk_count: i32,
}

/// A contiguous ~512-word segment of a document. Immutable after creation;
/// the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub document_id: Uuid,
    pub ordinal: i32,
    pub page_start: i32,
    pub page_end: i32,
    pub text: String,
    pub vector_id: i64,
    pub content_hash: String,
}

/// The durable record of one ingestion task and its state-machine progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Paused,
    Completed,
    Failed,
    Canceled,
}

impl ProcessingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProcessingStatus::Completed | ProcessingStatus::Failed | ProcessingStatus::Canceled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Paused => "paused",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
            ProcessingStatus::Canceled => "canceled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => ProcessingStatus::Pending,
            "processing" => ProcessingStatus::Processing,
            "paused" => ProcessingStatus::Paused,
            "completed" => ProcessingStatus::Completed,
            "failed" => ProcessingStatus::Failed,
            "canceled" => ProcessingStatus::Canceled,
            _ => return None,
        })
    }
}

/// Populates a failed job's `error_kind`/`error_detail` fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobError {
    pub kind: ErrorKind,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub id: Uuid,
    pub document_id: Uuid,
    pub filename: String,
    pub status: ProcessingStatus,
    pub total_pages: i32,
    pub pages_processed: i32,
    pub last_chunk_committed: i32,
    pub embeddings_created: i32,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_kind: Option<String>,
    pub error_detail: Option<String>,
}

impl ProcessingJob {
    pub fn new(document_id: Uuid, filename: String, total_pages: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            filename,
            status: ProcessingStatus::Pending,
            total_pages,
            pages_processed: 0,
            last_chunk_committed: -1,
            embeddings_created: 0,
            retry_count: 0,
            created_at: Utc::now(),
            started_at: None,
            paused_at: None,
            completed_at: None,
            error_kind: None,
            error_detail: None,
        }
    }
}
