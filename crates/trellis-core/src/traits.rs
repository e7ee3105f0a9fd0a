use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::config::ModelConfig;
use crate::error::Result;
use crate::structured;
use crate::types::*;

/// Streaming chat client for one or more LLM providers.
pub trait LlmClient: Send + Sync + 'static {
    /// Send a chat request and receive a stream of deltas.
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>>;
}

/// Reasoning service: maps a prompt to text or to a structured JSON object.
pub trait Reasoner: Send + Sync + 'static {
    /// Free-form completion.
    fn invoke(&self, prompt: String) -> BoxFuture<'_, Result<String>>;

    /// Completion constrained to a JSON schema.
    ///
    /// The default asks for JSON-only output through [`Reasoner::invoke`] and
    /// extracts the object from the reply. Output that is not JSON surfaces as
    /// `LlmParse`.
    fn invoke_structured(
        &self,
        prompt: String,
        schema: serde_json::Value,
    ) -> BoxFuture<'_, Result<serde_json::Value>> {
        Box::pin(async move {
            let reply = self
                .invoke(structured::schema_prompt(&prompt, &schema))
                .await?;
            structured::parse_json(&reply)
        })
    }
}

/// Search service: query in, result text out. Never fails: faults come back
/// as an error-shaped [`SearchOutcome`].
pub trait SearchService: Send + Sync + 'static {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// Run a query.
    fn invoke(&self, query: String) -> BoxFuture<'_, SearchOutcome>;
}
