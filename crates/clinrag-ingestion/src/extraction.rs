//! Single extraction pass: open the document once and extract all pages
//! into an ordered (page_number, text) sequence. Failure here is fatal for
//! the job (CONTENT_EXTRACTION).

use clinrag_common::ErrorKind;

use crate::models::{ExtractedDocument, PageText};

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("pdf parse failed: {0}")]
    Pdf(String),
    #[error("document is not valid UTF-8 text")]
    InvalidUtf8,
}

impl ExtractionError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ContentExtraction
    }
}

/// Documents above this page ceiling are rejected at submit time, before
/// extraction is ever attempted.
pub const MAX_DOCUMENT_PAGES: u32 = 2000;

pub fn extract(filename: &str, bytes: &[u8]) -> Result<ExtractedDocument, ExtractionError> {
    if filename.to_lowercase().ends_with(".pdf") {
        extract_pdf(bytes)
    } else {
        extract_plain_text(bytes)
    }
}

fn extract_plain_text(bytes: &[u8]) -> Result<ExtractedDocument, ExtractionError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ExtractionError::InvalidUtf8)?;
    Ok(ExtractedDocument { pages: vec![PageText { page_number: 1, text: text.to_string() }] })
}

fn extract_pdf(bytes: &[u8]) -> Result<ExtractedDocument, ExtractionError> {
    let document = lopdf::Document::load_mem(bytes).map_err(|e| ExtractionError::Pdf(e.to_string()))?;

    let mut pages = Vec::new();
    for (page_num, page_id) in document.get_pages() {
        let mut text = String::new();
        if let Ok(content) = document.get_page_content(page_id) {
            for object in content_objects(&content) {
                text.push_str(&object);
                text.push(' ');
            }
        }
        pages.push(PageText { page_number: page_num as i32, text });
    }
    pages.sort_by_key(|p| p.page_number);

    Ok(ExtractedDocument { pages })
}

/// Extracts raw string operands from a page's decoded content stream bytes
/// by direct scan over `lopdf::Object::String` values, rather than a full
/// layout-aware text extractor.
fn content_objects(content: &[u8]) -> Vec<String> {
    let Ok(parsed) = lopdf::content::Content::decode(content) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for operation in parsed.operations {
        for operand in operation.operands {
            if let lopdf::Object::String(bytes, _) = operand {
                if let Ok(s) = String::from_utf8(bytes) {
                    out.push(s);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_single_page() {
        let doc = extract("notes.txt", b"patient presented with fever").unwrap();
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.pages[0].page_number, 1);
    }

    #[test]
    fn invalid_utf8_is_content_extraction_error() {
        let err = extract("notes.txt", &[0xff, 0xfe, 0x00]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContentExtraction);
    }
}
