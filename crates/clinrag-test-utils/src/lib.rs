//! Fixture builders shared across crate test suites: plain builder functions
//! producing sample `Document`/`Chunk`/`ProcessingJob` values and randomized
//! embedding vectors, rather than a fixture framework.

use chrono::Utc;
use clinrag_common::{Chunk, Document, DocumentSource, ProcessingJob};
use uuid::Uuid;

/// A minimal valid `Document`, overridable via the builder-style `with_*`
/// methods.
pub struct DocumentFixture {
    document: Document,
}

impl DocumentFixture {
    pub fn new() -> Self {
        Self {
            document: Document {
                id: Uuid::new_v4(),
                filename: "sample.pdf".to_string(),
                content_hash: random_hex(64),
                byte_length: 1024,
                source: DocumentSource::Upload,
                category: None,
                uploaded_at: Utc::now(),
                total_pages: 3,
                indexed_chunk_count: 0,
            },
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.document.filename = filename.into();
        self
    }

    pub fn with_total_pages(mut self, pages: i32) -> Self {
        self.document.total_pages = pages;
        self
    }

    pub fn with_source(mut self, source: DocumentSource) -> Self {
        self.document.source = source;
        self
    }

    pub fn build(self) -> Document {
        self.document
    }
}

impl Default for DocumentFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A sample chunk belonging to `document_id`, at the given ordinal.
pub fn sample_chunk(document_id: Uuid, ordinal: i32) -> Chunk {
    Chunk {
        document_id,
        ordinal,
        page_start: 1,
        page_end: 1,
        text: format!("sample chunk text number {ordinal} with enough content to pass the minimum length check"),
        vector_id: ordinal as i64,
        content_hash: random_hex(64),
    }
}

/// A batch of `n` sequential sample chunks for `document_id`.
pub fn sample_chunks(document_id: Uuid, n: usize) -> Vec<Chunk> {
    (0..n as i32).map(|ordinal| sample_chunk(document_id, ordinal)).collect()
}

/// A freshly-submitted `ProcessingJob` for `document_id`.
pub fn sample_job(document_id: Uuid, filename: &str, total_pages: i32) -> ProcessingJob {
    ProcessingJob::new(document_id, filename.to_string(), total_pages)
}

/// A batch of pseudo-random embedding vectors with a fixed dimension, for
/// tests that need plausible but non-meaningful vectors.
pub fn sample_vectors(count: usize, dim: usize) -> Vec<Vec<f32>> {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..count).map(|_| (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect()).collect()
}

fn random_hex(len: usize) -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..len).map(|_| format!("{:x}", rng.gen_range(0..16u8))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_fixture_overrides_apply() {
        let doc = DocumentFixture::new().with_filename("notes.txt").with_total_pages(5).build();
        assert_eq!(doc.filename, "notes.txt");
        assert_eq!(doc.total_pages, 5);
    }

    #[test]
    fn sample_chunks_are_sequential() {
        let chunks = sample_chunks(Uuid::new_v4(), 3);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].ordinal, 2);
    }

    #[test]
    fn sample_vectors_have_requested_dimension() {
        let vectors = sample_vectors(2, 8);
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].len(), 8);
    }
}
