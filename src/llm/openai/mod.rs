
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChatMessage, ChatModel};
use crate::RagError;
use crate::config::OpenAiConfig;
use crate::http::ApiClient;

const CHAT_COMPLETIONS_ENDPOINT: &str = "chat/completions";

/// Chat model served by the OpenAI `/chat/completions` endpoint.
/// Runs at temperature zero so the same question yields the same answer.
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    client: ApiClient,
    model: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiChat {
    #[inline]
    pub fn new(config: &OpenAiConfig, api_key: &str, model: &str) -> Result<Self> {
        let client = ApiClient::new(config, api_key).context("Failed to create API client")?;
        Ok(Self::from_client(client, model))
    }

    #[inline]
    pub fn from_client(client: ApiClient, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
            temperature: 0.0,
        }
    }

    #[inline]
    pub fn complete_blocking(&self, messages: &[ChatMessage]) -> Result<String> {
        debug!(
            "Requesting completion from {} with {} messages",
            self.model,
            messages.len()
        );

        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let response: ChatResponse = self
            .client
            .post_json(CHAT_COMPLETIONS_ENDPOINT, &request)
            .context("Failed to generate completion")?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("Completion response contained no message"))?;

        debug!("Received completion of {} chars", content.len());
        Ok(content)
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, messages: &[ChatMessage]) -> crate::Result<String> {
        let this = self.clone();
        let messages = messages.to_vec();

        tokio::task::spawn_blocking(move || this.complete_blocking(&messages))
            .await
            .map_err(|e| RagError::Completion(format!("Completion task failed: {}", e)))?
            .map_err(|e| RagError::Completion(format!("{:#}", e)))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
