// Query orchestrator
// Runs one question through the chain and normalizes the outcome for display


use thiserror::Error;
use tracing::{debug, error};

use crate::RagError;
use crate::rag::{RagChain, RetrievalParams, RetrievedChunk};
use crate::session::{ConversationTurn, TurnRole};

/// Answer shown when a query could not be processed
pub const FALLBACK_ANSWER: &str = "Error processing query";

/// Everything the chat surface renders for one answered question
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    pub answer: String,
    /// Chunks the chain used as evidence for the answer
    pub source_documents: Vec<RetrievedChunk>,
    /// Chunks from a separate top-k retrieval, shown in the debug panel
    pub debug_chunks: Vec<RetrievedChunk>,
    /// One entry per debug chunk; `None` when the index reports no score
    pub similarity_scores: Vec<Option<f32>>,
    pub has_context: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// No index has been built yet
    MissingIndex,
    /// The embedding or chat-completion service failed
    ServiceFailure,
    Unknown,
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct QueryFailure {
    pub category: FailureCategory,
    pub message: String,
}

impl QueryFailure {
    /// The uniform empty response rendered in place of a failed answer
    #[inline]
    pub fn fallback_response(&self) -> QueryResponse {
        QueryResponse {
            answer: FALLBACK_ANSWER.to_string(),
            source_documents: Vec::new(),
            debug_chunks: Vec::new(),
            similarity_scores: Vec::new(),
            has_context: false,
        }
    }
}

impl From<RagError> for QueryFailure {
    #[inline]
    fn from(err: RagError) -> Self {
        let category = match &err {
            RagError::MissingIndex(_) => FailureCategory::MissingIndex,
            RagError::Embedding(_) | RagError::Completion(_) => FailureCategory::ServiceFailure,
            _ => FailureCategory::Unknown,
        };
        Self {
            category,
            message: err.to_string(),
        }
    }
}

/// Answer `question` against `chain` with the given retrieval sizes.
///
/// `history` holds the turns before this question. Only the user turns are
/// passed on to the chain, each paired with an empty answer.
#[inline]
pub async fn answer(
    chain: &mut RagChain,
    question: &str,
    history: &[ConversationTurn],
    k: usize,
    fetch_k: usize,
) -> Result<QueryResponse, QueryFailure> {
    let params = RetrievalParams::new(k, fetch_k).map_err(|e| QueryFailure {
        category: FailureCategory::Unknown,
        message: e.to_string(),
    })?;
    chain.set_retrieval(params);

    let result = run(chain, question, history).await;
    if let Err(failure) = &result {
        error!("RAG Error: {}", failure);
    }
    result
}

async fn run(
    chain: &RagChain,
    question: &str,
    history: &[ConversationTurn],
) -> Result<QueryResponse, QueryFailure> {
    let debug_chunks = chain.retriever().retrieve(question).await?;

    let chat_history: Vec<(String, String)> = history
        .iter()
        .filter(|turn| turn.role == TurnRole::User)
        .map(|turn| (turn.text.clone(), String::new()))
        .collect();

    let output = chain.call(question, &chat_history).await?;
    debug!(
        "Chain answered with {} source documents ({} debug chunks)",
        output.source_documents.len(),
        debug_chunks.len()
    );

    Ok(QueryResponse {
        answer: output.answer,
        has_context: !output.source_documents.is_empty(),
        source_documents: output.source_documents,
        similarity_scores: debug_chunks.iter().map(|c| c.score).collect(),
        debug_chunks,
    })
}
