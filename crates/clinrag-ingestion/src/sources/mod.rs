//! Literature source interface; only the PubMed implementation is retained.

pub mod pubmed;

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct LiteratureItem {
    pub external_id: String,
    pub title: String,
    pub abstract_text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned an unparsable response: {0}")]
    BadResponse(String),
}

#[async_trait]
pub trait LiteratureSource: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<LiteratureItem>, SourceError>;
}
