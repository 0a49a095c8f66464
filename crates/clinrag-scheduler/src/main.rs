//! Composition root: wires configuration, the relational store, the Vector
//! KB, the embedding client, and the ingestion pipeline together, then runs
//! the worker pool and periodic ingest trigger until the process is asked
//! to stop. The RAG synthesis pipeline and chat provider are library entry
//! points consumed by a surrounding service, not driven from this binary.

use std::sync::Arc;

use async_trait::async_trait;
use clinrag_config::Config;
use clinrag_db::Database;
use clinrag_embed::{EmbeddingConfig, HttpEmbeddingClient};
use clinrag_ingestion::pipeline::{IngestionPipeline, PipelineConfig};
use clinrag_ingestion::sources::pubmed::PubMedSource;
use clinrag_ingestion::sources::LiteratureSource;
use clinrag_kb::VectorKb;
use clinrag_scheduler::{HandlerError, Scheduler, SchedulerConfig, TaskHandler};
use serde_json::{json, Value};
use uuid::Uuid;

struct IngestDocumentHandler {
    pipeline: Arc<IngestionPipeline>,
}

#[async_trait]
impl TaskHandler for IngestDocumentHandler {
    async fn handle(&self, payload: Value) -> Result<(), HandlerError> {
        let job_id: Uuid = payload
            .get("job_id")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| HandlerError::new(clinrag_common::ErrorKind::Internal, "payload missing job_id"))?;

        self.pipeline
            .run(job_id)
            .await
            .map_err(|e| HandlerError::new(e.kind(), e.to_string()))
    }
}

/// Periodic literature pull: searches PubMed, submits each result as a
/// document, and runs its job inline. One firing per cron tick, deduplicated
/// by `clinrag_scheduler::trigger`'s window key.
struct PeriodicIngestHandler {
    pipeline: Arc<IngestionPipeline>,
    source: Arc<dyn LiteratureSource>,
    query: String,
    max_results: usize,
}

#[async_trait]
impl TaskHandler for PeriodicIngestHandler {
    async fn handle(&self, _payload: Value) -> Result<(), HandlerError> {
        let items = self
            .source
            .search(&self.query, self.max_results)
            .await
            .map_err(|e| HandlerError::new(clinrag_common::ErrorKind::Internal, e.to_string()))?;

        for item in items {
            let filename = format!("pubmed-{}.txt", item.external_id);
            let bytes = format!("{}\n\n{}", item.title, item.abstract_text).into_bytes();
            let outcome = self
                .pipeline
                .submit(&filename, bytes, clinrag_common::DocumentSource::PubMed, Some("pubmed".to_string()))
                .await
                .map_err(|e| HandlerError::new(e.kind(), e.to_string()))?;

            if outcome.was_new {
                self.pipeline
                    .run(outcome.job_id)
                    .await
                    .map_err(|e| HandlerError::new(e.kind(), e.to_string()))?;
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    clinrag_monitoring::init_logging();

    let config = Config::load("clinrag.toml")?;
    let db = Database::connect(&config.database_url).await?;
    db.initialize().await?;

    let kb = Arc::new(VectorKb::open(&config.kb_index_path, config.embedding_dim).await?);
    let embedder = Arc::new(HttpEmbeddingClient::new(EmbeddingConfig {
        base_url: config.embedding_api_base.clone(),
        api_key: config.embedding_api_key.clone(),
        model: config.embedding_model_id.clone(),
        dim: config.embedding_dim,
        timeout_seconds: config.rag_timeout_seconds,
    })?);

    let pipeline = Arc::new(IngestionPipeline::new(
        db.clone(),
        kb,
        embedder,
        PipelineConfig {
            chunk_words: config.chunk_words,
            chunk_overlap_words: config.chunk_overlap_words,
            batch_size_chunks: config.batch_size_chunks,
            db_commit_interval_chunks: config.db_commit_interval_chunks,
            max_retry_attempts: config.max_retry_attempts,
            max_document_pages: config.max_document_pages,
            object_store_path: config.object_store_path.clone().into(),
        },
    ));

    let scheduler = Scheduler::new(
        db,
        SchedulerConfig {
            worker_count: config.scheduler_worker_count,
            default_lease_seconds: config.task_lease_seconds as i64,
            max_retry_attempts: config.max_retry_attempts,
            ..Default::default()
        },
    );

    scheduler
        .register_handler("ingest_document", Arc::new(IngestDocumentHandler { pipeline: Arc::clone(&pipeline) }))
        .await;
    scheduler
        .register_handler(
            "ingest_periodic",
            Arc::new(PeriodicIngestHandler {
                pipeline,
                source: Arc::new(PubMedSource::new(None)),
                query: "clinical decision support".to_string(),
                max_results: 20,
            }),
        )
        .await;

    let _worker_handles = scheduler.spawn_workers();
    let _trigger_handle =
        clinrag_scheduler::spawn_periodic_trigger(Arc::clone(&scheduler), "ingest_periodic".to_string(), config.ingest_daily_cron.clone(), json!({}))?;

    tracing::info!("clinrag worker started");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    Ok(())
}
