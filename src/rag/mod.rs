// RAG chain module
// Loads a persisted index and answers questions grounded in retrieved chunks


mod prompts;

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{ConfigError, Settings};
use crate::database::{SearchResult, VectorStore};
use crate::document::ChunkMetadata;
use crate::embeddings::{Embedder, OpenAiEmbeddings};
use crate::llm::{ChatMessage, ChatModel, OpenAiChat};
use crate::{RagError, Result};

/// How many chunks a retrieval returns (`k`) and how large a candidate pool
/// it ranks them from (`fetch_k`). Always `1 <= k <= fetch_k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalParams {
    pub k: usize,
    pub fetch_k: usize,
}

impl Default for RetrievalParams {
    #[inline]
    fn default() -> Self {
        Self { k: 4, fetch_k: 8 }
    }
}

impl RetrievalParams {
    #[inline]
    pub fn new(k: usize, fetch_k: usize) -> std::result::Result<Self, ConfigError> {
        let params = Self { k, fetch_k };
        params.validate()?;
        Ok(params)
    }

    #[inline]
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.k == 0 || self.fetch_k < self.k {
            return Err(ConfigError::InvalidRetrieval {
                k: self.k,
                fetch_k: self.fetch_k,
            });
        }
        Ok(())
    }

    /// Change `k`, raising `fetch_k` to match if it would fall below it
    #[inline]
    #[must_use]
    pub fn with_k(self, k: usize) -> Self {
        let k = k.max(1);
        Self {
            k,
            fetch_k: self.fetch_k.max(k),
        }
    }

    /// Change `fetch_k`, pinned to at least the current `k`
    #[inline]
    #[must_use]
    pub fn with_fetch_k(self, fetch_k: usize) -> Self {
        Self {
            k: self.k,
            fetch_k: fetch_k.max(self.k),
        }
    }
}

/// A chunk returned by similarity search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub content: String,
    pub metadata: Option<ChunkMetadata>,
    /// Cosine similarity to the query; `None` when the index reports no distance
    pub score: Option<f32>,
}

impl From<SearchResult> for RetrievedChunk {
    #[inline]
    fn from(result: SearchResult) -> Self {
        Self {
            score: result.similarity(),
            content: result.content,
            metadata: result.metadata,
        }
    }
}

/// Similarity search over a [`VectorStore`] with adjustable result counts
pub struct Retriever {
    store: VectorStore,
    embedder: Arc<dyn Embedder>,
    params: RetrievalParams,
}

impl Retriever {
    #[inline]
    pub fn new(store: VectorStore, embedder: Arc<dyn Embedder>, params: RetrievalParams) -> Self {
        Self {
            store,
            embedder,
            params,
        }
    }

    #[inline]
    pub fn params(&self) -> RetrievalParams {
        self.params
    }

    #[inline]
    pub fn set_params(&mut self, params: RetrievalParams) {
        self.params = params;
    }

    #[inline]
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        let query_vector = self.embedder.embed_query(query).await?;
        let results = self
            .store
            .search(&query_vector, self.params.k, self.params.fetch_k)
            .await?;

        debug!("Retrieved {} chunks for query", results.len());
        Ok(results.into_iter().map(RetrievedChunk::from).collect())
    }
}

/// Result of one chain invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutput {
    pub answer: String,
    pub source_documents: Vec<RetrievedChunk>,
}

/// Conversational retrieval chain: condense the follow-up question against
/// prior turns, retrieve chunks for it, and answer from those chunks.
pub struct RagChain {
    retriever: Retriever,
    chat_model: Arc<dyn ChatModel>,
}

impl RagChain {
    /// Load the index at `index_path` and bind it to the given models.
    ///
    /// Fails with [`RagError::MissingIndex`] if no index has been built there.
    #[inline]
    pub async fn build(
        index_path: &Path,
        embedder: Arc<dyn Embedder>,
        chat_model: Arc<dyn ChatModel>,
        retrieval: RetrievalParams,
    ) -> Result<Self> {
        retrieval.validate()?;
        let store = VectorStore::open(index_path).await?;

        info!(
            "Loaded index from {} for model {}",
            index_path.display(),
            chat_model.model_name()
        );

        Ok(Self {
            retriever: Retriever::new(store, embedder, retrieval),
            chat_model,
        })
    }

    /// Build a chain over `VECTOR_DB_PATH` using the OpenAI models named in `settings`
    #[inline]
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let index_path = settings.require_vector_db_path()?;
        let api_key = settings.require_api_key()?;
        let openai = &settings.config.openai;

        let embedder = OpenAiEmbeddings::new(openai, api_key)?;
        let chat_model = OpenAiChat::new(openai, api_key, &settings.gpt_model)?;

        Self::build(
            index_path,
            Arc::new(embedder),
            Arc::new(chat_model),
            settings.config.retrieval,
        )
        .await
    }

    #[inline]
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    #[inline]
    pub fn set_retrieval(&mut self, params: RetrievalParams) {
        self.retriever.set_params(params);
    }

    /// Answer `question` given prior `(question, answer)` turns
    #[inline]
    pub async fn call(
        &self,
        question: &str,
        chat_history: &[(String, String)],
    ) -> Result<ChainOutput> {
        let standalone = if chat_history.is_empty() {
            question.to_string()
        } else {
            self.condense_question(question, chat_history).await?
        };

        let source_documents = self.retriever.retrieve(&standalone).await?;

        let messages = [
            ChatMessage::system(prompts::qa_system_prompt(
                source_documents.iter().map(|d| d.content.as_str()),
            )),
            ChatMessage::user(standalone),
        ];
        let answer = self.chat_model.complete(&messages).await?;

        Ok(ChainOutput {
            answer,
            source_documents,
        })
    }

    async fn condense_question(
        &self,
        question: &str,
        chat_history: &[(String, String)],
    ) -> Result<String> {
        let prompt = prompts::condense_question_prompt(chat_history, question);
        let condensed = self
            .chat_model
            .complete(&[ChatMessage::user(prompt)])
            .await?;
        let condensed = condensed.trim();

        debug!("Condensed follow-up question to: {}", condensed);
        if condensed.is_empty() {
            return Err(RagError::Completion(
                "Model returned an empty standalone question".to_string(),
            ));
        }
        Ok(condensed.to_string())
    }
}
