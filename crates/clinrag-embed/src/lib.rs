//! clinrag-embed — the embedding provider client: `embed(batch_of_texts)
//! -> batch_of_vectors` over an OpenAI-compatible HTTP endpoint. Local
//! in-process inference is out of scope; the embedding provider is always
//! an external collaborator.

use std::time::Duration;

use async_trait::async_trait;
use clinrag_common::ErrorKind;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
    #[error("upstream timed out")]
    Timeout,
    #[error("rate limited")]
    RateLimited,
    #[error("unexpected response shape: {0}")]
    BadResponse(String),
}

impl EmbedError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EmbedError::Timeout => ErrorKind::EmbeddingUpstreamTimeout,
            EmbedError::RateLimited => ErrorKind::EmbeddingRateLimited,
            EmbedError::Http(_) | EmbedError::Unavailable(_) => ErrorKind::EmbeddingUpstreamUnavailable,
            EmbedError::BadResponse(_) => ErrorKind::EmbeddingUpstreamUnavailable,
        }
    }
}

/// The external embedding provider contract. Implementations must tolerate
/// batch sizes up to the caller's `batch_size_chunks` and return vectors in
/// input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub dim: usize,
    pub timeout_seconds: u64,
}

/// An OpenAI-compatible `/embeddings` endpoint. Covers OpenAI itself, Ollama
/// (serving its OpenAI-compatible route), and self-hosted compatible servers
/// through one configurable client rather than a backend per provider.
pub struct HttpEmbeddingClient {
    client: reqwest::Client,
    config: EmbeddingConfig,
}

impl HttpEmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> Result<Self, EmbedError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { client, config })
    }
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingDatum>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingDatum {
    embedding: Vec<f32>,
    index: usize,
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self
            .client
            .post(format!("{}/embeddings", self.config.base_url))
            .json(&json!({ "model": self.config.model, "input": texts }));
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                EmbedError::Timeout
            } else {
                EmbedError::Http(e)
            }
        })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(EmbedError::RateLimited);
        }
        if status.is_server_error() {
            return Err(EmbedError::Unavailable(format!("status {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedError::BadResponse(format!("status {status}: {body}")));
        }

        let parsed: OpenAiEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::BadResponse(e.to_string()))?;

        let mut ordered = vec![Vec::new(); texts.len()];
        for datum in parsed.data {
            if datum.index < ordered.len() {
                ordered[datum.index] = datum.embedding;
            }
        }
        Ok(ordered)
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }

    fn dim(&self) -> usize {
        self.config.dim
    }
}

/// Retries a transient embedding failure with exponential backoff up to
/// `max_attempts`.
pub async fn embed_with_retry(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    max_attempts: u32,
) -> Result<Vec<Vec<f32>>, EmbedError> {
    let mut attempt = 0;
    loop {
        match provider.embed(texts).await {
            Ok(vectors) => return Ok(vectors),
            Err(e) if e.kind().is_transient() && attempt + 1 < max_attempts => {
                attempt += 1;
                let backoff = Duration::from_millis(200 * 2u64.pow(attempt));
                tracing::warn!(attempt, error = %e, "embedding call failed, retrying");
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_classifies_as_transient() {
        assert!(EmbedError::Timeout.kind().is_transient());
    }

    #[test]
    fn bad_response_is_not_transient() {
        assert!(!EmbedError::BadResponse("x".into()).kind().is_transient());
    }
}
