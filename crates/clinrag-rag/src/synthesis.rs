//! RAG Synthesis Pipeline: retrieve, assemble context and prompt, invoke the
//! chat provider, attach citations, and record the turn.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use clinrag_common::ErrorKind;
use clinrag_db::conversation::{ConversationStore, Role, Turn};
use clinrag_db::Database;
use clinrag_embed::EmbeddingProvider;
use clinrag_kb::{SearchFilters, VectorKb};
use clinrag_llm::{ChatProvider, CompletionRequest, LlmError};
use futures_core::Stream;
use uuid::Uuid;

const SYSTEM_INSTRUCTION: &str = "You are a clinical decision-support assistant. Answer strictly from the \
supplied evidence context. State uncertainty explicitly when the evidence is incomplete or ambiguous. Cite \
sources by the tag shown next to each context passage. Never invent a citation.";

const HISTORY_CHAR_BUDGET: usize = 4000;

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("query must not be empty")]
    InputRejected,
    #[error("no relevant evidence found under strict grounding")]
    RetrievalEmpty,
    #[error("chat upstream unavailable: {0}")]
    ChatUnavailable(String),
    #[error("chat upstream timed out")]
    ChatTimeout,
    #[error("storage: {0}")]
    Storage(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl RagError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RagError::InputRejected => ErrorKind::InputRejected,
            RagError::RetrievalEmpty => ErrorKind::RetrievalEmpty,
            RagError::ChatUnavailable(_) => ErrorKind::ChatUpstreamUnavailable,
            RagError::ChatTimeout => ErrorKind::ChatUpstreamTimeout,
            RagError::Storage(_) => ErrorKind::Storage,
            RagError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<clinrag_db::DbError> for RagError {
    fn from(e: clinrag_db::DbError) -> Self {
        RagError::Storage(e.to_string())
    }
}

impl From<clinrag_kb::KbError> for RagError {
    fn from(e: clinrag_kb::KbError) -> Self {
        RagError::Storage(e.to_string())
    }
}

impl From<clinrag_embed::EmbedError> for RagError {
    fn from(e: clinrag_embed::EmbedError) -> Self {
        RagError::Internal(e.to_string())
    }
}

impl From<LlmError> for RagError {
    fn from(e: LlmError) -> Self {
        match e.kind() {
            ErrorKind::ChatUpstreamTimeout => RagError::ChatTimeout,
            _ => RagError::ChatUnavailable(e.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Citation {
    pub source: String,
    pub excerpt: String,
    pub similarity_score: f32,
}

#[derive(Debug, Clone)]
pub struct AnswerResult {
    pub text: String,
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone)]
pub struct AnswerOptions {
    pub top_k: usize,
    pub include_sources: bool,
    pub max_tokens: u32,
    pub temperature: f32,
    pub document_id: Option<Uuid>,
}

impl Default for AnswerOptions {
    fn default() -> Self {
        Self { top_k: 5, include_sources: true, max_tokens: 2000, temperature: 0.7, document_id: None }
    }
}

#[derive(Debug, Clone)]
pub enum StreamEvent {
    Content(String),
    Complete { citations: Vec<Citation>, chars_emitted: usize },
    Error { kind: ErrorKind, message: String },
}

pub type AnswerEventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

#[derive(Debug, Clone)]
pub struct RagConfig {
    pub context_char_budget: usize,
    pub timeout: Duration,
    pub strict_grounding: bool,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self { context_char_budget: 8000, timeout: Duration::from_secs(30), strict_grounding: true }
    }
}

pub struct RagPipeline {
    db: Database,
    kb: Arc<VectorKb>,
    embedder: Arc<dyn EmbeddingProvider>,
    chat: Arc<dyn ChatProvider>,
    config: RagConfig,
}

struct RetrievedContext {
    block: String,
    citations: Vec<Citation>,
}

impl RagPipeline {
    pub fn new(
        db: Database,
        kb: Arc<VectorKb>,
        embedder: Arc<dyn EmbeddingProvider>,
        chat: Arc<dyn ChatProvider>,
        config: RagConfig,
    ) -> Self {
        Self { db, kb, embedder, chat, config }
    }

    pub async fn answer(
        &self,
        conversation_id: Uuid,
        query: &str,
        options: AnswerOptions,
    ) -> Result<AnswerResult, RagError> {
        if query.trim().is_empty() {
            return Err(RagError::InputRejected);
        }

        let conversation = ConversationStore::new(self.db.pool());
        let history = conversation.history(conversation_id).await?;
        conversation.append(conversation_id, Role::User, query).await?;

        let context = self.retrieve_and_assemble(query, &options).await?;

        let prompt = build_prompt(&context.block, &history, query);
        let request = CompletionRequest {
            prompt,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            timeout: self.config.timeout,
        };

        let text = self.complete_with_retry(&request).await?;
        conversation.append(conversation_id, Role::Assistant, &text).await?;

        let citations = if options.include_sources { context.citations } else { Vec::new() };
        Ok(AnswerResult { text, citations })
    }

    /// Streams the answer as it is generated. The assistant turn is recorded
    /// only once the upstream stream reaches its natural end — if the
    /// consumer drops the returned stream early, the forwarding task stops
    /// pulling from the chat provider at its next yield point and the
    /// partial text is never persisted.
    pub async fn answer_stream(
        &self,
        conversation_id: Uuid,
        query: &str,
        options: AnswerOptions,
    ) -> Result<AnswerEventStream, RagError> {
        if query.trim().is_empty() {
            return Err(RagError::InputRejected);
        }

        let conversation = ConversationStore::new(self.db.pool());
        let history = conversation.history(conversation_id).await?;
        conversation.append(conversation_id, Role::User, query).await?;

        let context = self.retrieve_and_assemble(query, &options).await?;

        let prompt = build_prompt(&context.block, &history, query);
        let request = CompletionRequest {
            prompt,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            timeout: self.config.timeout,
        };

        let chat = Arc::clone(&self.chat);
        let citations = if options.include_sources { context.citations } else { Vec::new() };
        let pool = self.db.pool().clone();
        let (tx, rx) = tokio::sync::mpsc::channel::<StreamEvent>(32);

        tokio::spawn(async move {
            let mut inner = chat.complete_stream(request);
            let mut accumulated = String::new();

            loop {
                use futures_util::StreamExt;
                let next = inner.next().await;
                let Some(piece) = next else { break };
                match piece {
                    Ok(text) => {
                        accumulated.push_str(&text);
                        if tx.send(StreamEvent::Content(text)).await.is_err() {
                            // consumer dropped the stream: stop pulling from upstream,
                            // do not persist the assistant turn.
                            return;
                        }
                    }
                    Err(e) => {
                        let kind = e.kind();
                        let _ = tx.send(StreamEvent::Error { kind, message: e.to_string() }).await;
                        return;
                    }
                }
            }

            let _ = ConversationStore::new(&pool).append(conversation_id, Role::Assistant, &accumulated).await;
            let _ = tx
                .send(StreamEvent::Complete { citations, chars_emitted: accumulated.len() })
                .await;
        });

        Ok(Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx)))
    }

    /// Empty retrieval under strict grounding surfaces `RagError::RetrievalEmpty`
    /// directly, rather than silently substituting a canned answer; the
    /// caller decides how to present that to the end user.
    async fn retrieve_and_assemble(
        &self,
        query: &str,
        options: &AnswerOptions,
    ) -> Result<RetrievedContext, RagError> {
        let query_vector = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Internal("embedding provider returned no vector".into()))?;

        let filters = SearchFilters { document_id: options.document_id };
        let hits = self.kb.search(&query_vector, options.top_k, &filters).await?;

        if hits.is_empty() {
            if self.config.strict_grounding {
                return Err(RagError::RetrievalEmpty);
            }
            return Ok(RetrievedContext { block: String::new(), citations: Vec::new() });
        }

        let mut block = String::new();
        let mut citations = Vec::new();
        for hit in &hits {
            let tag = format!("[source: {}]", hit.chunk.document_id);
            let addition = format!("{tag} {}\n\n", hit.chunk.text);
            if !block.is_empty() && block.len() + addition.len() > self.config.context_char_budget {
                break;
            }
            block.push_str(&addition);
            citations.push(Citation {
                source: hit.chunk.document_id.to_string(),
                excerpt: hit.chunk.text.chars().take(200).collect(),
                similarity_score: hit.score,
            });
        }

        Ok(RetrievedContext { block, citations })
    }

    /// Retries once on a transient chat failure after a short backoff,
    /// mirroring `clinrag_embed::embed_with_retry`.
    async fn complete_with_retry(&self, request: &CompletionRequest) -> Result<String, RagError> {
        match self.chat.complete(request).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind().is_transient() => {
                tracing::warn!(error = %e, "chat completion failed, retrying once");
                tokio::time::sleep(Duration::from_millis(400)).await;
                Ok(self.chat.complete(request).await?)
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn build_prompt(context_block: &str, history: &[Turn], query: &str) -> String {
    let history_block = truncate_history(history, HISTORY_CHAR_BUDGET);
    format!(
        "{SYSTEM_INSTRUCTION}\n\n--- CONTEXT ---\n{context_block}\n--- CONVERSATION HISTORY ---\n{history_block}\n\
--- QUESTION ---\n{query}\n"
    )
}

/// Keeps the most recent turns, dropping older ones first, within a
/// character budget.
fn truncate_history(history: &[Turn], char_budget: usize) -> String {
    let mut kept = Vec::new();
    let mut used = 0usize;
    for turn in history.iter().rev() {
        let line = format!("{}: {}\n", turn.role.as_str(), turn.content);
        if used + line.len() > char_budget {
            break;
        }
        used += line.len();
        kept.push(line);
    }
    kept.reverse();
    kept.concat()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn turn(role: Role, content: &str) -> Turn {
        Turn { role, content: content.to_string(), created_at: Utc::now() }
    }

    #[test]
    fn truncate_history_keeps_most_recent_turns() {
        let history = vec![turn(Role::User, "first"), turn(Role::Assistant, "second"), turn(Role::User, "third")];
        let result = truncate_history(&history, 12);
        assert!(result.contains("third"));
        assert!(!result.contains("first"));
    }

    #[test]
    fn empty_query_is_rejected() {
        // build_prompt itself never validates; the guard lives in answer()/
        // answer_stream(), asserted here via the error classification.
        assert_eq!(RagError::InputRejected.kind(), ErrorKind::InputRejected);
    }
}
