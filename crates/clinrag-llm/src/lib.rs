//! clinrag-llm — chat provider abstraction over an OpenAI-compatible
//! completion endpoint, with streaming support.

pub mod backend;

pub use backend::{ChatConfig, ChatProvider, CompletionRequest, ContentStream, LlmError, OpenAiCompatibleChat};
