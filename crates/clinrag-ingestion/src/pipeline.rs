//! The ingest orchestrator: submit -> extract -> chunk -> embed -> commit,
//! with cooperative pause/resume/cancel at batch boundaries and idempotent
//! re-entry via `last_chunk_committed`.

use std::path::PathBuf;
use std::sync::Arc;

use clinrag_common::{Document, DocumentSource, ErrorKind, JobError, ProcessingJob, ProcessingStatus};
use clinrag_db::documents::DocumentRepository;
use clinrag_db::jobs::JobRepository;
use clinrag_db::Database;
use clinrag_embed::{embed_with_retry, EmbeddingProvider};
use clinrag_kb::VectorKb;
use uuid::Uuid;

use crate::chunker::chunk_document;
use crate::dedup::content_hash;
use crate::extraction::{extract, MAX_DOCUMENT_PAGES};
use crate::models::PendingChunk;

#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("document rejected: {0}")]
    InputRejected(String),
    #[error("content extraction failed: {0}")]
    ContentExtraction(String),
    #[error("storage: {0}")]
    Storage(String),
    #[error("embedding upstream: {0}")]
    Embedding(#[from] clinrag_embed::EmbedError),
    #[error("job {0} not found")]
    JobNotFound(Uuid),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestionError::InputRejected(_) => ErrorKind::InputRejected,
            IngestionError::ContentExtraction(_) => ErrorKind::ContentExtraction,
            IngestionError::Storage(_) | IngestionError::Io(_) => ErrorKind::Storage,
            IngestionError::Embedding(e) => e.kind(),
            IngestionError::JobNotFound(_) => ErrorKind::Internal,
        }
    }
}

impl From<clinrag_db::DbError> for IngestionError {
    fn from(e: clinrag_db::DbError) -> Self {
        IngestionError::Storage(e.to_string())
    }
}

impl From<clinrag_kb::KbError> for IngestionError {
    fn from(e: clinrag_kb::KbError) -> Self {
        IngestionError::Storage(e.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub chunk_words: usize,
    pub chunk_overlap_words: usize,
    pub batch_size_chunks: usize,
    pub db_commit_interval_chunks: usize,
    pub max_retry_attempts: u32,
    pub max_document_pages: u32,
    pub object_store_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_words: 512,
            chunk_overlap_words: 100,
            batch_size_chunks: 25,
            db_commit_interval_chunks: 10,
            max_retry_attempts: 3,
            max_document_pages: MAX_DOCUMENT_PAGES,
            object_store_path: PathBuf::from("./data/documents"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub document_id: Uuid,
    pub job_id: Uuid,
    pub was_new: bool,
}

pub struct IngestionPipeline {
    db: Database,
    kb: Arc<VectorKb>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: PipelineConfig,
}

impl IngestionPipeline {
    pub fn new(db: Database, kb: Arc<VectorKb>, embedder: Arc<dyn EmbeddingProvider>, config: PipelineConfig) -> Self {
        Self { db, kb, embedder, config }
    }

    /// Registers a document and its ingestion job. Idempotent on content
    /// hash: resubmitting identical bytes returns the existing document and
    /// job without creating a new one. Oversize documents (by page count) are
    /// rejected here, before any job or chunk is created.
    pub async fn submit(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        source: DocumentSource,
        category: Option<String>,
    ) -> Result<SubmitOutcome, IngestionError> {
        let hash = content_hash(&bytes);
        let documents = DocumentRepository::new(self.db.pool());
        let jobs = JobRepository::new(self.db.pool());

        if let Some(existing) = documents.find_by_content_hash(&hash).await? {
            let job = jobs
                .find_by_document_id(existing.id)
                .await?
                .ok_or_else(|| IngestionError::Storage("document exists without a job".into()))?;
            return Ok(SubmitOutcome { document_id: existing.id, job_id: job.id, was_new: false });
        }

        let extracted = extract(filename, &bytes).map_err(|e| IngestionError::ContentExtraction(e.to_string()))?;
        let total_pages = extracted.total_pages();
        if total_pages as u32 > self.config.max_document_pages {
            return Err(IngestionError::InputRejected(format!(
                "document has {total_pages} pages, exceeding the {} page limit",
                self.config.max_document_pages
            )));
        }

        let upsert = documents
            .upsert(filename, &hash, bytes.len() as i64, source, category.as_deref(), total_pages)
            .await?;
        self.write_object(upsert.document.id, &bytes).await?;

        let job = ProcessingJob::new(upsert.document.id, filename.to_string(), total_pages);
        jobs.create(&job).await?;

        Ok(SubmitOutcome { document_id: upsert.document.id, job_id: job.id, was_new: true })
    }

    /// Runs (or resumes) a job to completion. Re-extracts and re-chunks the
    /// stored bytes on every call — chunking is a pure function of
    /// (bytes, config), so re-entry after a pause/crash is just "skip
    /// chunks already committed" (`ordinal <= last_chunk_committed`).
    pub async fn run(&self, job_id: Uuid) -> Result<(), IngestionError> {
        let jobs = JobRepository::new(self.db.pool());
        let documents = DocumentRepository::new(self.db.pool());

        let job = jobs.find_by_id(job_id).await?.ok_or(IngestionError::JobNotFound(job_id))?;
        if job.status.is_terminal() {
            return Ok(());
        }

        let document = documents
            .find_by_id(job.document_id)
            .await?
            .ok_or_else(|| IngestionError::Storage("job references a missing document".into()))?;

        jobs.start(job_id).await?;

        let result = self.run_inner(&jobs, &documents, &job, &document).await;
        if let Err(e) = &result {
            let error = JobError { kind: e.kind(), detail: e.to_string() };
            jobs.fail(job_id, &error).await?;
        }
        result
    }

    async fn run_inner(
        &self,
        jobs: &JobRepository<'_>,
        documents: &DocumentRepository<'_>,
        job: &ProcessingJob,
        document: &Document,
    ) -> Result<(), IngestionError> {
        let bytes = self.read_object(document.id).await?;
        let extracted = extract(&document.filename, &bytes).map_err(|e| IngestionError::ContentExtraction(e.to_string()))?;
        let all_chunks = chunk_document(&extracted.pages, self.config.chunk_words, self.config.chunk_overlap_words);

        if all_chunks.is_empty() {
            documents.set_indexed_chunk_count(document.id, 0).await?;
            jobs.checkpoint(job.id, extracted.total_pages(), -1, 0).await?;
            jobs.complete(job.id).await?;
            return Ok(());
        }

        let remaining: Vec<&PendingChunk> =
            all_chunks.iter().filter(|c| c.ordinal > job.last_chunk_committed).collect();

        let mut last_committed = job.last_chunk_committed;
        let mut embeddings_created = job.embeddings_created;
        let mut since_checkpoint = 0usize;

        for batch in remaining.chunks(self.config.batch_size_chunks.max(1)) {
            if self.was_paused_or_canceled(jobs, job.id).await? {
                return Ok(());
            }

            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = embed_with_retry(self.embedder.as_ref(), &texts, self.config.max_retry_attempts).await?;

            let items = batch
                .iter()
                .zip(vectors.into_iter())
                .map(|(chunk, vector)| {
                    let hash = content_hash(chunk.text.as_bytes());
                    (chunk.ordinal, chunk.page_start, chunk.page_end, chunk.text.clone(), hash, vector)
                })
                .collect();
            self.kb.add_batch(document.id, items).await?;

            last_committed = batch.last().map(|c| c.ordinal).unwrap_or(last_committed);
            embeddings_created += batch.len() as i32;
            since_checkpoint += batch.len();

            let pages_processed = batch.last().map(|c| c.page_end).unwrap_or(document.total_pages);
            let is_last_batch = last_committed == all_chunks.last().map(|c| c.ordinal).unwrap_or(-1);
            if since_checkpoint >= self.config.db_commit_interval_chunks || is_last_batch {
                jobs.checkpoint(job.id, pages_processed, last_committed, embeddings_created).await?;
                since_checkpoint = 0;
            }
        }

        documents.set_indexed_chunk_count(document.id, all_chunks.len() as i32).await?;
        jobs.complete(job.id).await?;
        Ok(())
    }

    async fn was_paused_or_canceled(&self, jobs: &JobRepository<'_>, job_id: Uuid) -> Result<bool, IngestionError> {
        let current = jobs.find_by_id(job_id).await?.ok_or(IngestionError::JobNotFound(job_id))?;
        Ok(matches!(current.status, ProcessingStatus::Paused | ProcessingStatus::Canceled))
    }

    pub async fn pause(&self, job_id: Uuid) -> Result<(), IngestionError> {
        JobRepository::new(self.db.pool()).request_pause(job_id).await?;
        Ok(())
    }

    pub async fn resume(&self, job_id: Uuid) -> Result<(), IngestionError> {
        self.run(job_id).await
    }

    pub async fn cancel(&self, job_id: Uuid) -> Result<(), IngestionError> {
        JobRepository::new(self.db.pool()).request_cancel(job_id).await?;
        Ok(())
    }

    /// Deletes a document and its chunks everywhere: vector rows first, then
    /// the relational row, to avoid orphaning metadata if the process dies
    /// mid-delete.
    pub async fn delete_document(&self, document_id: Uuid) -> Result<(), IngestionError> {
        self.kb.delete(document_id).await?;
        DocumentRepository::new(self.db.pool()).delete(document_id).await?;
        Ok(())
    }

    fn object_path(&self, document_id: Uuid) -> PathBuf {
        self.config.object_store_path.join(document_id.to_string())
    }

    async fn write_object(&self, document_id: Uuid, bytes: &[u8]) -> Result<(), IngestionError> {
        if let Some(parent) = self.object_path(document_id).parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(self.object_path(document_id), bytes).await?;
        Ok(())
    }

    async fn read_object(&self, document_id: Uuid) -> Result<Vec<u8>, IngestionError> {
        tokio::fs::read(self.object_path(document_id)).await.map_err(IngestionError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.chunk_words, 512);
        assert_eq!(config.chunk_overlap_words, 100);
        assert_eq!(config.batch_size_chunks, 25);
        assert_eq!(config.db_commit_interval_chunks, 10);
    }
}
