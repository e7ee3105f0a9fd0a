//! Mocks and fixtures shared by the Trellis test suites.
//!
//! Every mock records what it was asked so tests can assert on the exact
//! sequence of collaborator calls.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::Mutex;

use futures::future::BoxFuture;

use trellis_core::error::{Result, TrellisError};
use trellis_core::traits::{Reasoner, SearchService};
use trellis_core::types::SearchOutcome;

/// Reasoner that replays a fixed queue of replies in order.
///
/// Structured calls go through the trait's default implementation, so a
/// queued JSON string serves `invoke_structured` as well. An exhausted queue
/// fails with `LlmRequest`.
#[derive(Default)]
pub struct ScriptedReasoner {
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedReasoner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain-text reply.
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.into()));
        self
    }

    /// Queue a JSON reply.
    pub fn reply_json(self, value: serde_json::Value) -> Self {
        self.reply(value.to_string())
    }

    /// Queue a transport failure.
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.replies.lock().unwrap().push_back(Err(message.into()));
        self
    }

    /// Prompts received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// Replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

impl Reasoner for ScriptedReasoner {
    fn invoke(&self, prompt: String) -> BoxFuture<'_, Result<String>> {
        self.prompts.lock().unwrap().push(prompt);
        let next = self.replies.lock().unwrap().pop_front();
        Box::pin(async move {
            match next {
                Some(Ok(text)) => Ok(text),
                Some(Err(message)) => Err(TrellisError::LlmRequest(message)),
                None => Err(TrellisError::LlmRequest("reasoner script exhausted".into())),
            }
        })
    }
}

/// Reasoner whose reply is computed from the prompt.
pub struct FnReasoner<F> {
    respond: F,
    prompts: Mutex<Vec<String>>,
}

impl<F> FnReasoner<F>
where
    F: Fn(&str) -> std::result::Result<String, String> + Send + Sync + 'static,
{
    pub fn new(respond: F) -> Self {
        Self {
            respond,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Number of prompts containing `needle`.
    pub fn count_containing(&self, needle: &str) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.contains(needle))
            .count()
    }
}

impl<F> Reasoner for FnReasoner<F>
where
    F: Fn(&str) -> std::result::Result<String, String> + Send + Sync + 'static,
{
    fn invoke(&self, prompt: String) -> BoxFuture<'_, Result<String>> {
        let reply = (self.respond)(&prompt).map_err(TrellisError::LlmRequest);
        self.prompts.lock().unwrap().push(prompt);
        Box::pin(async move { reply })
    }
}

type SearchFn = Box<dyn Fn(&str) -> SearchOutcome + Send + Sync>;

/// Search backend driven by a closure, recording every query.
pub struct MockSearch {
    respond: SearchFn,
    queries: Mutex<Vec<String>>,
}

impl MockSearch {
    pub fn from_fn(respond: impl Fn(&str) -> SearchOutcome + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Every query succeeds with `text`.
    pub fn always_ok(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::from_fn(move |_| SearchOutcome::success(text.clone()))
    }

    /// Every query fails with an error-shaped payload.
    pub fn always_err(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::from_fn(move |_| SearchOutcome::error(message.clone()))
    }

    /// Queries received so far, in order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl SearchService for MockSearch {
    fn name(&self) -> &str {
        "mock"
    }

    fn invoke(&self, query: String) -> BoxFuture<'_, SearchOutcome> {
        let outcome = (self.respond)(&query);
        self.queries.lock().unwrap().push(query);
        Box::pin(async move { outcome })
    }
}

/// Write `content` to a temporary `.toml` file that lives as long as the handle.
pub fn temp_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("create temp config");
    file.write_all(content.as_bytes()).expect("write temp config");
    file
}
