//! Semantic chunking: sliding word window with overlap, counted in exact
//! words rather than estimated tokens.

use crate::models::{PageText, PendingChunk};

/// Minimum non-whitespace characters for a chunk to be kept.
const MIN_NON_WHITESPACE_CHARS: usize = 50;

pub fn chunk_document(pages: &[PageText], window_words: usize, overlap_words: usize) -> Vec<PendingChunk> {
    let mut words: Vec<&str> = Vec::new();
    let mut word_pages: Vec<i32> = Vec::new();
    for page in pages {
        for word in page.text.split_whitespace() {
            words.push(word);
            word_pages.push(page.page_number);
        }
    }

    if words.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut ordinal = 0;
    let mut start = 0;

    loop {
        let end = (start + window_words).min(words.len());
        let text = words[start..end].join(" ");

        if non_whitespace_len(&text) >= MIN_NON_WHITESPACE_CHARS {
            chunks.push(PendingChunk {
                ordinal,
                page_start: word_pages[start],
                page_end: word_pages[end - 1],
                text,
            });
            ordinal += 1;
        }

        if end == words.len() {
            break;
        }
        start += window_words.saturating_sub(overlap_words).max(1);
    }

    chunks
}

fn non_whitespace_len(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: i32, words: usize) -> PageText {
        PageText { page_number: n, text: vec!["word"; words].join(" ") }
    }

    #[test]
    fn empty_document_yields_no_chunks() {
        assert!(chunk_document(&[], 512, 100).is_empty());
    }

    #[test]
    fn exactly_window_words_yields_one_chunk() {
        let pages = vec![page(1, 512)];
        let chunks = chunk_document(&pages, 512, 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page_start, 1);
        assert_eq!(chunks[0].page_end, 1);
    }

    #[test]
    fn window_plus_one_yields_two_overlapping_chunks() {
        let pages = vec![page(1, 513)];
        let chunks = chunk_document(&pages, 512, 100);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].ordinal, 1);
    }

    #[test]
    fn short_trailing_remainder_is_discarded() {
        // 512 + 3 words: second window is only the 3-word remainder, well
        // under the 50-character minimum, so it must be dropped.
        let pages = vec![page(1, 515)];
        let chunks = chunk_document(&pages, 512, 0);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn chunk_carries_starting_page_across_a_page_boundary() {
        let pages = vec![page(1, 10), page(2, 600)];
        let chunks = chunk_document(&pages, 512, 100);
        assert_eq!(chunks[0].page_start, 1);
    }
}
