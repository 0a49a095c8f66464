//! Chat provider interface: `complete` and `complete_stream` over an
//! OpenAI-compatible completion endpoint.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use clinrag_common::ErrorKind;
use futures_core::Stream;
use serde::Deserialize;
use serde_json::json;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
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

impl LlmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LlmError::Timeout => ErrorKind::ChatUpstreamTimeout,
            LlmError::RateLimited => ErrorKind::ChatRateLimited,
            LlmError::Http(_) | LlmError::Unavailable(_) | LlmError::BadResponse(_) => {
                ErrorKind::ChatUpstreamUnavailable
            }
        }
    }
}

pub type ContentStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Completion request shape shared by `complete` and `complete_stream`.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
    fn complete_stream(&self, request: CompletionRequest) -> ContentStream;
    fn model_id(&self) -> &str;
    fn max_context_tokens(&self) -> u32;
    fn max_output_tokens(&self) -> u32;
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_context_tokens: u32,
    pub max_output_tokens: u32,
}

pub struct OpenAiCompatibleChat {
    client: reqwest::Client,
    config: ChatConfig,
}

impl OpenAiCompatibleChat {
    pub fn new(config: ChatConfig) -> Self {
        Self { client: reqwest::Client::new(), config }
    }

    fn request_body(&self, req: &CompletionRequest, stream: bool) -> serde_json::Value {
        json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": req.prompt}],
            "max_tokens": req.max_tokens,
            "temperature": req.temperature,
            "stream": stream,
        })
    }

    fn build_request(&self, body: serde_json::Value) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(format!("{}/chat/completions", self.config.base_url)).json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatStreamChunk {
    choices: Vec<ChatStreamChoice>,
}

#[derive(Deserialize)]
struct ChatStreamChoice {
    delta: ChatStreamDelta,
}

#[derive(Deserialize, Default)]
struct ChatStreamDelta {
    content: Option<String>,
}

#[async_trait]
impl ChatProvider for OpenAiCompatibleChat {
    async fn complete(&self, req: &CompletionRequest) -> Result<String, LlmError> {
        let body = self.request_body(req, false);
        let response = tokio::time::timeout(req.timeout, self.build_request(body).send())
            .await
            .map_err(|_| LlmError::Timeout)?
            .map_err(LlmError::Http)?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited);
        }
        if status.is_server_error() {
            return Err(LlmError::Unavailable(format!("status {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::BadResponse(format!("status {status}: {body}")));
        }

        let parsed: ChatCompletionResponse =
            response.json().await.map_err(|e| LlmError::BadResponse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::BadResponse("no choices in response".into()))
    }

    /// Produces a lazy sequence of text chunks by reading the provider's SSE
    /// stream on a background task and forwarding parsed deltas through a
    /// single-consumer channel, since each call to `complete_stream` has
    /// exactly one subscriber.
    fn complete_stream(&self, req: CompletionRequest) -> ContentStream {
        let body = self.request_body(&req, true);
        let request = self.build_request(body);
        let timeout = req.timeout;
        let (tx, rx) = tokio::sync::mpsc::channel::<Result<String, LlmError>>(32);

        tokio::spawn(async move {
            let send_result = tokio::time::timeout(timeout, request.send()).await;
            let response = match send_result {
                Err(_) => {
                    let _ = tx.send(Err(LlmError::Timeout)).await;
                    return;
                }
                Ok(Err(e)) => {
                    let _ = tx.send(Err(LlmError::Http(e))).await;
                    return;
                }
                Ok(Ok(r)) => r,
            };

            if !response.status().is_success() {
                let status = response.status();
                let err = if status.as_u16() == 429 {
                    LlmError::RateLimited
                } else {
                    LlmError::Unavailable(format!("status {status}"))
                };
                let _ = tx.send(Err(err)).await;
                return;
            }

            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();
            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = tx.send(Err(LlmError::Http(e))).await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = buffer.find("\n\n") {
                    let event = buffer[..pos].to_string();
                    buffer.drain(..pos + 2);
                    for line in event.lines() {
                        let Some(data) = line.strip_prefix("data: ") else { continue };
                        if data == "[DONE]" {
                            return;
                        }
                        if let Ok(parsed) = serde_json::from_str::<ChatStreamChunk>(data) {
                            if let Some(content) = parsed.choices.into_iter().next().and_then(|c| c.delta.content) {
                                if !content.is_empty() && tx.send(Ok(content)).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                }
            }
        });

        Box::pin(ReceiverStream::new(rx))
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }

    fn max_context_tokens(&self) -> u32 {
        self.config.max_context_tokens
    }

    fn max_output_tokens(&self) -> u32 {
        self.config.max_output_tokens
    }
}
