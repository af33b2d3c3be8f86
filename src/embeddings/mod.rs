// Embeddings module
// Text chunking and the embedding service behind the `Embedder` trait

pub mod chunking;
pub mod openai;

use async_trait::async_trait;

pub use chunking::{ChunkingConfig, DocumentChunk, RecursiveCharacterSplitter, char_len};
pub use openai::OpenAiEmbeddings;

/// Turns text into vectors for similarity search
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed document chunks for indexing, one vector per input in order
    async fn embed_documents(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>>;

    /// Embed a single search query
    async fn embed_query(&self, text: &str) -> crate::Result<Vec<f32>>;
}
