//! ProcessingJob repository. Encodes the job state machine:
//!
//! ```text
//! PENDING -> PROCESSING -> COMPLETED
//!            <-> PAUSED -> CANCELED
//!  PROCESSING/PAUSED -> FAILED
//! ```
//!
//! Transitions are idempotent and only accepted from the indicated source
//! states; anything else is a no-op that returns the job unchanged.

use clinrag_common::{JobError, ProcessingJob, ProcessingStatus};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::DbError;

pub struct JobRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> JobRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, job: &ProcessingJob) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO processing_jobs
                (id, document_id, filename, status, total_pages, pages_processed,
                 last_chunk_committed, embeddings_created, retry_count, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(job.id)
        .bind(job.document_id)
        .bind(&job.filename)
        .bind(job.status.as_str())
        .bind(job.total_pages)
        .bind(job.pages_processed)
        .bind(job.last_chunk_committed)
        .bind(job.embeddings_created)
        .bind(job.retry_count)
        .bind(job.created_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<ProcessingJob>, DbError> {
        let row = sqlx::query("SELECT * FROM processing_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(row_to_job).transpose()
    }

    /// One document has at most one job; used by submit-time idempotent
    /// resubmission to report the existing job back.
    pub async fn find_by_document_id(&self, document_id: Uuid) -> Result<Option<ProcessingJob>, DbError> {
        let row = sqlx::query("SELECT * FROM processing_jobs WHERE document_id = $1")
            .bind(document_id)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(row_to_job).transpose()
    }

    /// Begins (or resumes into) PROCESSING. Accepted from PENDING or PAUSED.
    pub async fn start(&self, id: Uuid) -> Result<(), DbError> {
        sqlx::query(
            r#"UPDATE processing_jobs SET status = 'processing', started_at = COALESCE(started_at, now())
               WHERE id = $1 AND status IN ('pending', 'paused')"#,
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Checkpoint write, called after every batch commit.
    pub async fn checkpoint(
        &self,
        id: Uuid,
        pages_processed: i32,
        last_chunk_committed: i32,
        embeddings_created: i32,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"UPDATE processing_jobs
               SET pages_processed = $2, last_chunk_committed = $3, embeddings_created = $4
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(pages_processed)
        .bind(last_chunk_committed)
        .bind(embeddings_created)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Sets the cooperative pause flag; takes effect at the worker's next
    /// batch boundary.
    pub async fn request_pause(&self, id: Uuid) -> Result<(), DbError> {
        sqlx::query("UPDATE processing_jobs SET status = 'paused', paused_at = now() WHERE id = $1 AND status = 'processing'")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    pub async fn request_cancel(&self, id: Uuid) -> Result<(), DbError> {
        sqlx::query(
            "UPDATE processing_jobs SET status = 'canceled', completed_at = now() WHERE id = $1 AND status IN ('pending', 'processing', 'paused')",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn complete(&self, id: Uuid) -> Result<(), DbError> {
        sqlx::query(
            "UPDATE processing_jobs SET status = 'completed', completed_at = now() WHERE id = $1 AND status = 'processing'",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn fail(&self, id: Uuid, error: &JobError) -> Result<(), DbError> {
        sqlx::query(
            r#"UPDATE processing_jobs
               SET status = 'failed', completed_at = now(), error_kind = $2, error_detail = $3,
                   retry_count = retry_count + 1
               WHERE id = $1 AND status IN ('processing', 'paused')"#,
        )
        .bind(id)
        .bind(error.kind.as_str())
        .bind(&error.detail)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}

fn row_to_job(row: &sqlx::postgres::PgRow) -> Result<ProcessingJob, DbError> {
    let status_str: String = row.try_get("status")?;
    let status = ProcessingStatus::from_str(&status_str).unwrap_or(ProcessingStatus::Failed);
    Ok(ProcessingJob {
        id: row.try_get("id")?,
        document_id: row.try_get("document_id")?,
        filename: row.try_get("filename")?,
        status,
        total_pages: row.try_get("total_pages")?,
        pages_processed: row.try_get("pages_processed")?,
        last_chunk_committed: row.try_get("last_chunk_committed")?,
        embeddings_created: row.try_get("embeddings_created")?,
        retry_count: row.try_get("retry_count")?,
        created_at: row.try_get("created_at")?,
        started_at: row.try_get("started_at")?,
        paused_at: row.try_get("paused_at")?,
        completed_at: row.try_get("completed_at")?,
        error_kind: row.try_get("error_kind")?,
        error_detail: row.try_get("error_detail")?,
    })
}
