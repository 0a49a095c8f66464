//! Ingestion & Chunking Engine: extracts text, splits it into overlapping
//! word-window chunks, deduplicates by content hash, pulls literature from
//! external sources, and drives documents through the Vector KB commit
//! pipeline.

pub mod chunker;
pub mod dedup;
pub mod extraction;
pub mod models;
pub mod pipeline;
pub mod sources;

pub use dedup::content_hash;
pub use extraction::{extract, ExtractionError, MAX_DOCUMENT_PAGES};
pub use models::{ExtractedDocument, PageText, PendingChunk};
pub use pipeline::{IngestionError, IngestionPipeline, PipelineConfig, SubmitOutcome};
