//! clinrag-kb — the Vector Knowledge Base: persistent ANN index with a
//! parallel metadata store, implemented as one LanceDB/Arrow table carrying
//! both.

pub mod database;
pub mod error;
pub mod schema;
pub mod store;

pub use error::KbError;
pub use store::{SearchFilters, SearchHit, Statistics, VectorKb};
