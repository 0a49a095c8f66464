//! The Vector Knowledge Base: a single owning component around the chunk
//! table, serializing writers through a mutex so only one write is in
//! flight at a time.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};

use futures_util::StreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use tokio::sync::Mutex;
use uuid::Uuid;

use clinrag_common::Chunk;

use crate::database::Database;
use crate::error::KbError;
use crate::schema::{chunks_to_record, record_embedding, record_to_stored_chunk, CommitStatus, StoredChunk};

/// One retrieval result: the chunk plus a similarity score in [0, 1].
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub document_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct Statistics {
    pub total_documents: usize,
    pub total_chunks: u64,
    pub embedding_dim: usize,
}

pub struct VectorKb {
    db: Database,
    write_lock: Mutex<()>,
    next_vector_id: AtomicI64,
}

impl VectorKb {
    pub async fn open(path: &str, embedding_dim: usize) -> Result<Self, KbError> {
        let db = Database::open(path, embedding_dim).await?;
        let next_vector_id = max_vector_id(&db).await?.map(|v| v + 1).unwrap_or(0);
        let kb = Self {
            db,
            write_lock: Mutex::new(()),
            next_vector_id: AtomicI64::new(next_vector_id),
        };
        kb.recover().await?;
        Ok(kb)
    }

    /// Appends vectors and metadata to the index; atomic per call. Implements
    /// the write-order contract: insert as `pending`, then flip to
    /// `committed` only once the insert succeeded.
    pub async fn add_batch(
        &self,
        document_id: Uuid,
        items: Vec<(i32, i32, i32, String, String, Vec<f32>)>, // (ordinal, page_start, page_end, text, content_hash, vector)
    ) -> Result<Vec<i64>, KbError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let dim = self.db.embedding_dim();
        for (_, _, _, _, _, v) in &items {
            if v.len() != dim {
                return Err(KbError::InvalidEmbeddingDimension { expected: dim, actual: v.len() });
            }
        }

        let _guard = self.write_lock.lock().await;
        let start_id = self.next_vector_id.fetch_add(items.len() as i64, Ordering::SeqCst);

        let mut vector_ids = Vec::with_capacity(items.len());
        let mut rows = Vec::with_capacity(items.len());
        for (i, (ordinal, page_start, page_end, text, content_hash, vector)) in items.into_iter().enumerate() {
            let vector_id = start_id + i as i64;
            vector_ids.push(vector_id);
            rows.push((
                StoredChunk {
                    chunk: Chunk {
                        document_id,
                        ordinal,
                        page_start,
                        page_end,
                        text,
                        vector_id,
                        content_hash,
                    },
                    status: CommitStatus::Pending,
                },
                vector,
            ));
        }

        let record = chunks_to_record(&rows, dim)?;
        let table = self.db.chunks_table().await?;
        let schema = record.schema();
        let iter = arrow_array::RecordBatchIterator::new(vec![Ok(record)], schema);
        table.add(iter).execute().await?;

        let min_id = vector_ids[0];
        let max_id = *vector_ids.last().unwrap();
        table
            .update()
            .only_if(format!("vector_id >= {min_id} AND vector_id <= {max_id}"))
            .column("status", "'committed'")
            .execute()
            .await?;

        Ok(vector_ids)
    }

    /// k-NN search over committed vectors only; similarity is `1/(1+L2)`,
    /// ties broken by ascending `vector_id` for determinism.
    pub async fn search(&self, query_vector: &[f32], top_k: usize, filters: &SearchFilters) -> Result<Vec<SearchHit>, KbError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let table = self.db.chunks_table().await?;
        let mut predicate = "status = 'committed'".to_string();
        if let Some(doc_id) = filters.document_id {
            predicate.push_str(&format!(" AND document_id = '{doc_id}'"));
        }

        let mut stream = table
            .vector_search(query_vector.to_vec())?
            .only_if(predicate)
            .limit(top_k)
            .execute()
            .await?;

        let mut hits = Vec::new();
        while let Some(batch) = stream.next().await {
            let batch = batch?;
            for i in 0..batch.num_rows() {
                let stored = record_to_stored_chunk(&batch, i)?;
                let embedding = record_embedding(&batch, i);
                let score = similarity(query_vector, &embedding);
                hits.push((stored.chunk, score));
            }
        }

        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.vector_id.cmp(&b.0.vector_id))
        });
        hits.truncate(top_k);
        Ok(hits.into_iter().map(|(chunk, score)| SearchHit { chunk, score }).collect())
    }

    /// Removes all chunks (and their vectors) for a document, deleting the
    /// whole row, vector and metadata together.
    pub async fn delete(&self, document_id: Uuid) -> Result<(), KbError> {
        let _guard = self.write_lock.lock().await;
        let table = self.db.chunks_table().await?;
        table.delete(&format!("document_id = '{document_id}'")).await?;
        Ok(())
    }

    pub async fn statistics(&self) -> Result<Statistics, KbError> {
        let table = self.db.chunks_table().await?;
        let total_chunks = table.count_rows(Some("status = 'committed'".to_string())).await? as u64;

        let mut stream = table.query().only_if("status = 'committed'").execute().await?;
        let mut documents = HashSet::new();
        while let Some(batch) = stream.next().await {
            let batch = batch?;
            for i in 0..batch.num_rows() {
                documents.insert(record_to_stored_chunk(&batch, i)?.chunk.document_id);
            }
        }

        Ok(Statistics {
            total_documents: documents.len(),
            total_chunks,
            embedding_dim: self.db.embedding_dim(),
        })
    }

    /// LanceDB commits each write durably; `persist` compacts storage so
    /// that growth from many small batch commits doesn't accumulate an
    /// unbounded fragment count.
    pub async fn persist(&self) -> Result<(), KbError> {
        self.db.optimize().await
    }

    /// The on-disk table is opened lazily by `lancedb::connect`; `load` is a
    /// no-op placeholder for callers that expect an explicit warm-up step.
    pub async fn load(&self) -> Result<(), KbError> {
        self.db.chunks_table().await.map(|_| ())
    }

    /// Crash-recovery pass: any row still `status = 'pending'` at startup
    /// means the commit's status-flip step never completed, so the row is
    /// deleted rather than trusted.
    async fn recover(&self) -> Result<(), KbError> {
        let table = self.db.chunks_table().await?;
        table.delete("status = 'pending'").await?;
        Ok(())
    }
}

async fn max_vector_id(db: &Database) -> Result<Option<i64>, KbError> {
    let table = db.chunks_table().await?;
    let mut stream = table.query().execute().await?;
    let mut max: Option<i64> = None;
    while let Some(batch) = stream.next().await {
        let batch = batch?;
        for i in 0..batch.num_rows() {
            let stored = record_to_stored_chunk(&batch, i)?;
            max = Some(max.map_or(stored.chunk.vector_id, |m| m.max(stored.chunk.vector_id)));
        }
    }
    Ok(max)
}

/// Maps L2 distance to a [0, 1] similarity score; the mapping itself is
/// part of the stable contract callers rely on.
fn similarity(query: &[f32], candidate: &[f32]) -> f32 {
    let l2: f32 = query
        .iter()
        .zip(candidate.iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f32>()
        .sqrt();
    1.0 / (1.0 + l2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_is_one_for_identical_vectors() {
        let v = vec![0.1, 0.2, 0.3];
        assert!((similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn similarity_decreases_with_distance() {
        let a = vec![0.0, 0.0];
        let near = vec![0.1, 0.0];
        let far = vec![5.0, 0.0];
        assert!(similarity(&a, &near) > similarity(&a, &far));
    }
}
