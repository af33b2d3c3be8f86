// Database module
// Persistent vector index over embedded document chunks, backed by LanceDB

pub mod lancedb;

pub use self::lancedb::{EmbeddingRecord, SearchResult, VectorStore};
