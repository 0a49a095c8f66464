//! Configuration loading: TOML file merged with environment overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// All runtime tunables, with their documented defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub batch_size_chunks: usize,
    pub chunk_words: usize,
    pub chunk_overlap_words: usize,
    pub db_commit_interval_chunks: usize,
    pub embedding_model_id: String,
    pub embedding_dim: usize,
    pub chat_model_id: String,
    pub chat_temperature: f32,
    pub chat_max_tokens: u32,
    pub retrieval_top_k: usize,
    pub retrieval_context_char_budget: usize,
    pub rag_timeout_seconds: u64,
    pub ingest_daily_cron: String,
    pub max_retry_attempts: u32,
    pub task_lease_seconds: u64,
    pub kb_index_path: String,
    pub kb_metadata_path: String,
    pub object_store_path: String,
    pub database_url: String,
    pub embedding_api_base: String,
    pub embedding_api_key: Option<String>,
    pub chat_api_base: String,
    pub chat_api_key: Option<String>,
    pub strict_grounding: bool,
    pub max_document_pages: u32,
    pub scheduler_worker_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_size_chunks: 25,
            chunk_words: 512,
            chunk_overlap_words: 100,
            db_commit_interval_chunks: 10,
            embedding_model_id: "text-embedding-3-small".to_string(),
            embedding_dim: 1536,
            chat_model_id: "gpt-4o-mini".to_string(),
            chat_temperature: 0.7,
            chat_max_tokens: 2000,
            retrieval_top_k: 5,
            retrieval_context_char_budget: 8000,
            rag_timeout_seconds: 30,
            ingest_daily_cron: "0 2 * * *".to_string(),
            max_retry_attempts: 3,
            task_lease_seconds: 3600,
            kb_index_path: "./data/kb/index".to_string(),
            kb_metadata_path: "./data/kb/index".to_string(),
            object_store_path: "./data/documents".to_string(),
            database_url: "postgres://localhost/clinrag".to_string(),
            embedding_api_base: "https://api.openai.com/v1".to_string(),
            embedding_api_key: None,
            chat_api_base: "https://api.openai.com/v1".to_string(),
            chat_api_key: None,
            strict_grounding: true,
            max_document_pages: 2000,
            scheduler_worker_count: 1,
        }
    }
}

impl Config {
    /// Loads `.env` (if present), then a TOML file (if present), then applies
    /// `CLINRAG_*` environment overrides on top of defaults. Missing file is
    /// not an error — the repo ships usable defaults.
    pub fn load(toml_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let mut config = Config::default();
        let path = toml_path.as_ref();
        if path.exists() {
            let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
                path: path.display().to_string(),
                source: e,
            })?;
            config = toml::from_str(&text)?;
        }
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CLINRAG_DATABASE_URL") {
            self.database_url = v;
        }
        if let Ok(v) = std::env::var("CLINRAG_EMBEDDING_API_KEY") {
            self.embedding_api_key = Some(v);
        }
        if let Ok(v) = std::env::var("CLINRAG_CHAT_API_KEY") {
            self.chat_api_key = Some(v);
        }
        if let Ok(v) = std::env::var("CLINRAG_EMBEDDING_DIM") {
            if let Ok(dim) = v.parse() {
                self.embedding_dim = dim;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding_dim == 0 {
            return Err(ConfigError::Invalid("embedding_dim must be > 0".into()));
        }
        if self.chunk_words == 0 {
            return Err(ConfigError::Invalid("chunk_words must be > 0".into()));
        }
        if self.chunk_overlap_words >= self.chunk_words {
            return Err(ConfigError::Invalid(
                "chunk_overlap_words must be smaller than chunk_words".into(),
            ));
        }
        if cron::Schedule::try_from(normalize_cron(&self.ingest_daily_cron).as_str()).is_err() {
            return Err(ConfigError::Invalid(format!(
                "ingest_daily_cron is not a valid cron expression: {}",
                self.ingest_daily_cron
            )));
        }
        Ok(())
    }
}

/// The `cron` crate expects a leading seconds field; minute-granularity
/// 5-field expressions get a `0` seconds field prefixed.
pub fn normalize_cron(expr: &str) -> String {
    if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let c = Config::default();
        assert_eq!(c.batch_size_chunks, 25);
        assert_eq!(c.chunk_words, 512);
        assert_eq!(c.chunk_overlap_words, 100);
        assert_eq!(c.db_commit_interval_chunks, 10);
        assert_eq!(c.max_retry_attempts, 3);
        assert_eq!(c.task_lease_seconds, 3600);
        assert_eq!(c.ingest_daily_cron, "0 2 * * *");
    }

    #[test]
    fn rejects_overlap_larger_than_window() {
        let mut c = Config::default();
        c.chunk_overlap_words = 600;
        assert!(c.validate().is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let c = Config::load("/nonexistent/clinrag.toml").unwrap();
        assert_eq!(c.embedding_dim, 1536);
    }
}
