use std::sync::Arc;

use futures::future::BoxFuture;
use futures::StreamExt;
use tracing::debug;

use trellis_core::config::ModelConfig;
use trellis_core::error::{Result, TrellisError};
use trellis_core::traits::{LlmClient, Reasoner};
use trellis_core::types::{ChatMessage, StreamDelta};

/// [`Reasoner`] backed by a streaming [`LlmClient`].
///
/// Each call is a fresh single-turn conversation, so the adapter holds no
/// per-run state and can be shared between concurrent runs.
pub struct LlmReasoner {
    llm: Arc<dyn LlmClient>,
    config: ModelConfig,
    system_prompt: Option<String>,
}

impl LlmReasoner {
    pub fn new(llm: Arc<dyn LlmClient>, config: ModelConfig) -> Self {
        Self {
            llm,
            config,
            system_prompt: None,
        }
    }

    /// Prepend a system message to every request.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    fn messages(&self, prompt: String) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_prompt {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.push(ChatMessage::user(prompt));
        messages
    }
}

impl Reasoner for LlmReasoner {
    fn invoke(&self, prompt: String) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let mut stream = self
                .llm
                .chat_stream(&self.config, self.messages(prompt))
                .await?;

            let mut response = String::new();
            while let Some(delta) = stream.next().await {
                match delta? {
                    StreamDelta::TextDelta(text) => response.push_str(&text),
                    StreamDelta::Usage {
                        input_tokens,
                        output_tokens,
                    } => debug!(input_tokens, output_tokens, "Reasoner usage"),
                    StreamDelta::Stop(reason) => debug!(?reason, "Reasoner stream stopped"),
                }
            }

            if response.trim().is_empty() {
                return Err(TrellisError::LlmRequest("empty response from model".into()));
            }
            Ok(response)
        })
    }
}
