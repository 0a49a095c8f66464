//! clinrag-rag — the RAG Synthesis Pipeline: retrieval, context and prompt
//! assembly, chat invocation, citation attachment, conversation recording,
//! and the auxiliary drug-interaction/ICD-10 helpers.

pub mod helpers;
pub mod synthesis;

pub use helpers::{check_drug_interactions, icd10_search, DrugInteraction, Icd10Entry, Severity};
pub use synthesis::{
    AnswerEventStream, AnswerOptions, AnswerResult, Citation, RagConfig, RagError, RagPipeline, StreamEvent,
};
