//! Document repository. Upsert-by-content-hash makes submission idempotent:
//! the same bytes submitted twice yield the same document id and no new
//! ingestion job.

use chrono::{DateTime, Utc};
use clinrag_common::{Document, DocumentSource};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::DbError;

pub struct DocumentRepository<'a> {
    pool: &'a PgPool,
}

/// Result of submitting a document: whether this is a brand-new document or
/// an existing one returned unchanged.
pub struct UpsertResult {
    pub document: Document,
    pub was_new: bool,
}

impl<'a> DocumentRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(
        &self,
        filename: &str,
        content_hash: &str,
        byte_length: i64,
        source: DocumentSource,
        category: Option<&str>,
        total_pages: i32,
    ) -> Result<UpsertResult, DbError> {
        let id = Uuid::new_v4();
        let row = sqlx::query(
            r#"
            WITH ins AS (
                INSERT INTO documents (id, filename, content_hash, byte_length, source, category, total_pages)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (content_hash) DO NOTHING
                RETURNING id, filename, content_hash, byte_length, source, category,
                          uploaded_at, total_pages, indexed_chunk_count, TRUE AS is_new
            )
            SELECT * FROM ins
            UNION ALL
            SELECT id, filename, content_hash, byte_length, source, category,
                   uploaded_at, total_pages, indexed_chunk_count, FALSE AS is_new
            FROM documents WHERE content_hash = $3 AND NOT EXISTS (SELECT 1 FROM ins)
            "#,
        )
        .bind(id)
        .bind(filename)
        .bind(content_hash)
        .bind(byte_length)
        .bind(source.as_str())
        .bind(category)
        .bind(total_pages)
        .fetch_one(self.pool)
        .await?;

        Ok(UpsertResult {
            document: row_to_document(&row)?,
            was_new: row.try_get("is_new")?,
        })
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Document>, DbError> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(row_to_document).transpose()
    }

    pub async fn find_by_content_hash(&self, hash: &str) -> Result<Option<Document>, DbError> {
        let row = sqlx::query("SELECT * FROM documents WHERE content_hash = $1")
            .bind(hash)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(row_to_document).transpose()
    }

    /// Set after a batch commit to the Vector KB; must equal the chunk count.
    pub async fn set_indexed_chunk_count(&self, id: Uuid, count: i32) -> Result<(), DbError> {
        sqlx::query("UPDATE documents SET indexed_chunk_count = $2 WHERE id = $1")
            .bind(id)
            .bind(count)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Deletes the document row. Cascading chunk/vector deletion happens in
    /// the Vector KB; callers must delete from the KB first to avoid
    /// orphaning chunk metadata.
    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, DbError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM documents")
            .fetch_one(self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }
}

fn row_to_document(row: &sqlx::postgres::PgRow) -> Result<Document, DbError> {
    let source_str: String = row.try_get("source")?;
    let source = match source_str.as_str() {
        "pubmed" => DocumentSource::PubMed,
        _ => DocumentSource::Upload,
    };
    let uploaded_at: DateTime<Utc> = row.try_get("uploaded_at")?;
    Ok(Document {
        id: row.try_get("id")?,
        filename: row.try_get("filename")?,
        content_hash: row.try_get("content_hash")?,
        byte_length: row.try_get("byte_length")?,
        source,
        category: row.try_get("category")?,
        uploaded_at,
        total_pages: row.try_get("total_pages")?,
        indexed_chunk_count: row.try_get("indexed_chunk_count")?,
    })
}
