//! Arrow schema and record-batch conversion for the chunk table: a
//! column-by-column `downcast_ref` read pattern over a `FixedSizeList<Float32>`
//! embedding column plus the chunk metadata fields.

use std::sync::Arc;

use arrow_array::{Array, FixedSizeListArray, Float32Array, Int32Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use clinrag_common::Chunk;
use uuid::Uuid;

use crate::error::KbError;

pub const TABLE_CHUNKS: &str = "chunks";

/// `pending` rows are invisible to search until flipped to `committed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStatus {
    Pending,
    Committed,
}

impl CommitStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CommitStatus::Pending => "pending",
            CommitStatus::Committed => "committed",
        }
    }
}

/// One row of the chunk table: `Chunk` metadata plus the KB's own internal
/// bookkeeping columns (`vector_id`, `status`).
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub chunk: Chunk,
    pub status: CommitStatus,
}

pub fn chunk_schema(embedding_dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("document_id", DataType::Utf8, false),
        Field::new("ordinal", DataType::Int32, false),
        Field::new("page_start", DataType::Int32, false),
        Field::new("page_end", DataType::Int32, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("content_hash", DataType::Utf8, false),
        Field::new("vector_id", DataType::Int64, false),
        Field::new("status", DataType::Utf8, false),
        Field::new(
            "embedding",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, false)), embedding_dim as i32),
            false,
        ),
    ]))
}

pub fn chunks_to_record(
    rows: &[(StoredChunk, Vec<f32>)],
    embedding_dim: usize,
) -> Result<RecordBatch, KbError> {
    let schema = chunk_schema(embedding_dim);

    let document_id = StringArray::from_iter_values(rows.iter().map(|(r, _)| r.chunk.document_id.to_string()));
    let ordinal = Int32Array::from_iter_values(rows.iter().map(|(r, _)| r.chunk.ordinal));
    let page_start = Int32Array::from_iter_values(rows.iter().map(|(r, _)| r.chunk.page_start));
    let page_end = Int32Array::from_iter_values(rows.iter().map(|(r, _)| r.chunk.page_end));
    let text = StringArray::from_iter_values(rows.iter().map(|(r, _)| r.chunk.text.clone()));
    let content_hash = StringArray::from_iter_values(rows.iter().map(|(r, _)| r.chunk.content_hash.clone()));
    let vector_id = Int64Array::from_iter_values(rows.iter().map(|(r, _)| r.chunk.vector_id));
    let status = StringArray::from_iter_values(rows.iter().map(|(r, _)| r.status.as_str().to_string()));

    let flat: Vec<f32> = rows.iter().flat_map(|(_, v)| v.iter().copied()).collect();
    let values = Float32Array::from(flat);
    let field = Arc::new(Field::new("item", DataType::Float32, false));
    let embedding = FixedSizeListArray::try_new(field, embedding_dim as i32, Arc::new(values), None)?;

    Ok(RecordBatch::try_new(
        schema,
        vec![
            Arc::new(document_id),
            Arc::new(ordinal),
            Arc::new(page_start),
            Arc::new(page_end),
            Arc::new(text),
            Arc::new(content_hash),
            Arc::new(vector_id),
            Arc::new(status),
            Arc::new(embedding),
        ],
    )?)
}

pub fn record_to_stored_chunk(batch: &RecordBatch, row: usize) -> Result<StoredChunk, KbError> {
    let get_string = |col: usize| -> String {
        batch.column(col).as_any().downcast_ref::<StringArray>().unwrap().value(row).to_string()
    };
    let get_i32 = |col: usize| -> i32 { batch.column(col).as_any().downcast_ref::<Int32Array>().unwrap().value(row) };
    let get_i64 = |col: usize| -> i64 { batch.column(col).as_any().downcast_ref::<Int64Array>().unwrap().value(row) };

    let document_id = Uuid::parse_str(&get_string(0)).map_err(|e| KbError::Arrow(e.to_string()))?;
    let status = match get_string(7).as_str() {
        "committed" => CommitStatus::Committed,
        _ => CommitStatus::Pending,
    };

    Ok(StoredChunk {
        chunk: Chunk {
            document_id,
            ordinal: get_i32(1),
            page_start: get_i32(2),
            page_end: get_i32(3),
            text: get_string(4),
            vector_id: get_i64(6),
            content_hash: get_string(5),
        },
        status,
    })
}

pub fn record_embedding(batch: &RecordBatch, row: usize) -> Vec<f32> {
    let arr = batch.column(8).as_any().downcast_ref::<FixedSizeListArray>().unwrap();
    let values = arr.value(row);
    let floats = values.as_any().downcast_ref::<Float32Array>().unwrap();
    floats.values().to_vec()
}
