// Chat session state
// Conversation history, retrieval sizes and the lazily built chain for one user


use std::future::Future;

use serde::Serialize;
use tracing::info;

use crate::Result;
use crate::query::{self, QueryFailure, QueryResponse};
use crate::rag::{RagChain, RetrievalParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub text: String,
}

impl ConversationTurn {
    #[inline]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    #[inline]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            text: text.into(),
        }
    }
}

/// Per-session context handed to the query orchestrator
#[derive(Default)]
pub struct ChatSession {
    history: Vec<ConversationTurn>,
    params: RetrievalParams,
    chain: Option<RagChain>,
}

impl ChatSession {
    #[inline]
    pub fn new(params: RetrievalParams) -> Self {
        Self {
            history: Vec::new(),
            params,
            chain: None,
        }
    }

    #[inline]
    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    #[inline]
    pub fn params(&self) -> RetrievalParams {
        self.params
    }

    /// Set `k`, raising `fetch_k` if needed to keep `fetch_k >= k`
    #[inline]
    pub fn set_k(&mut self, k: usize) -> RetrievalParams {
        self.params = self.params.with_k(k);
        self.params
    }

    /// Set `fetch_k`, never below the current `k`
    #[inline]
    pub fn set_fetch_k(&mut self, fetch_k: usize) -> RetrievalParams {
        self.params = self.params.with_fetch_k(fetch_k);
        self.params
    }

    /// Forget the conversation. The chain and its index are kept.
    #[inline]
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    #[inline]
    pub fn has_chain(&self) -> bool {
        self.chain.is_some()
    }

    /// Return the session's chain, building it with `init` on first use.
    /// A failed build is not cached, so the next call tries again.
    #[inline]
    pub async fn chain_or_init<F, Fut>(&mut self, init: F) -> Result<&mut RagChain>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RagChain>>,
    {
        ensure_chain(&mut self.chain, init).await
    }

    /// Record `question`, answer it and record the reply.
    ///
    /// On failure the fallback answer is recorded as the assistant turn so the
    /// transcript stays in user/assistant order.
    #[inline]
    pub async fn ask<F, Fut>(
        &mut self,
        question: &str,
        init: F,
    ) -> std::result::Result<QueryResponse, QueryFailure>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RagChain>>,
    {
        let prior_len = self.history.len();
        self.history.push(ConversationTurn::user(question));

        let result = match ensure_chain(&mut self.chain, init).await {
            Ok(chain) => {
                let prior = self.history.get(..prior_len).unwrap_or_default();
                query::answer(chain, question, prior, self.params.k, self.params.fetch_k).await
            }
            Err(e) => Err(QueryFailure::from(e)),
        };

        let reply = match &result {
            Ok(response) => response.answer.clone(),
            Err(failure) => failure.fallback_response().answer,
        };
        self.history.push(ConversationTurn::assistant(reply));

        result
    }
}

async fn ensure_chain<F, Fut>(slot: &mut Option<RagChain>, init: F) -> Result<&mut RagChain>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<RagChain>>,
{
    let chain = match slot.take() {
        Some(chain) => chain,
        None => {
            let chain = init().await?;
            info!("RAG chain initialized");
            chain
        }
    };
    Ok(slot.insert(chain))
}
