//! Shared shapes between extraction and chunking.

/// One page of extracted text, in document order.
#[derive(Debug, Clone)]
pub struct PageText {
    pub page_number: i32,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub pages: Vec<PageText>,
}

impl ExtractedDocument {
    pub fn total_pages(&self) -> i32 {
        self.pages.len() as i32
    }
}

/// A chunk before it has been embedded or committed: carries the page it
/// starts on so the job's `pages_processed` counter can be derived from the
/// chunk→page map.
#[derive(Debug, Clone)]
pub struct PendingChunk {
    pub ordinal: i32,
    pub page_start: i32,
    pub page_end: i32,
    pub text: String,
}
