//! clinrag-common — shared error taxonomy and core domain types.

pub mod error;
pub mod types;

pub use error::ErrorKind;
pub use types::{Chunk, Document, DocumentSource, JobError, ProcessingJob, ProcessingStatus};
