// LanceDB vector database module
// Handles vector storage and similarity search for chunk embeddings


pub mod vector_store;

use serde::{Deserialize, Serialize};

use crate::document::ChunkMetadata;
use crate::embeddings::DocumentChunk;

pub use vector_store::{SearchResult, VectorStore};

/// Embedding record stored in LanceDB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Unique identifier for this embedding
    pub id: String,
    /// The vector embedding; every record in one index shares its length
    pub vector: Vec<f32>,
    /// The chunk text the vector was computed from
    pub content: String,
    pub metadata: ChunkMetadata,
    /// RFC 3339 timestamp of when this embedding was created
    pub created_at: String,
}

impl EmbeddingRecord {
    #[inline]
    pub fn from_chunk(chunk: DocumentChunk, vector: Vec<f32>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            vector,
            content: chunk.content,
            metadata: chunk.metadata,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
