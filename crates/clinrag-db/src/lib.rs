//! clinrag-db — relational store for `Document`/`ProcessingJob` rows, the
//! durable work queue, and conversation history. Backed by PostgreSQL via
//! `sqlx`.

pub mod conversation;
pub mod documents;
pub mod error;
pub mod jobs;
pub mod queue;

pub use error::DbError;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Owns the connection pool and creates the schema on first use.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates all tables if they do not already exist. Safe to call on
    /// every startup.
    pub async fn initialize(&self) -> Result<(), DbError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id UUID PRIMARY KEY,
                filename TEXT NOT NULL,
                content_hash TEXT NOT NULL UNIQUE,
                byte_length BIGINT NOT NULL,
                source TEXT NOT NULL,
                category TEXT,
                uploaded_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                total_pages INT NOT NULL DEFAULT 0,
                indexed_chunk_count INT NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS processing_jobs (
                id UUID PRIMARY KEY,
                document_id UUID NOT NULL REFERENCES documents(id),
                filename TEXT NOT NULL,
                status TEXT NOT NULL,
                total_pages INT NOT NULL,
                pages_processed INT NOT NULL DEFAULT 0,
                last_chunk_committed INT NOT NULL DEFAULT -1,
                embeddings_created INT NOT NULL DEFAULT 0,
                retry_count INT NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                started_at TIMESTAMPTZ,
                paused_at TIMESTAMPTZ,
                completed_at TIMESTAMPTZ,
                error_kind TEXT,
                error_detail TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS task_queue (
                id UUID PRIMARY KEY,
                task_kind TEXT NOT NULL,
                payload JSONB NOT NULL,
                dedup_key TEXT UNIQUE,
                status TEXT NOT NULL DEFAULT 'queued',
                attempts INT NOT NULL DEFAULT 0,
                available_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                lease_expires_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                last_error TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversation_turn (
                id BIGSERIAL PRIMARY KEY,
                conversation_id UUID NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
