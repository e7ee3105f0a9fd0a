use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one workflow run.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_str(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A chat message sent to the reasoning service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
            timestamp: Some(Utc::now()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
            timestamp: Some(Utc::now()),
        }
    }
}

/// Stop reason from the LLM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
}

/// A streaming delta from the LLM.
#[derive(Debug, Clone)]
pub enum StreamDelta {
    /// A chunk of text content.
    TextDelta(String),

    /// The response is complete.
    Stop(StopReason),

    /// Usage information.
    Usage {
        input_tokens: u64,
        output_tokens: u64,
    },
}

/// Prefix every error-shaped search payload starts with.
pub const SEARCH_ERROR_PREFIX: &str = "Error:";

/// Result of one search call.
///
/// Search backends never fail: a fault comes back as text starting with
/// [`SEARCH_ERROR_PREFIX`], with `is_error` set so callers do not have to
/// sniff the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub text: String,
    pub is_error: bool,
}

impl SearchOutcome {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    /// Build an error outcome. The prefix is added unless already present.
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        let text = if message.starts_with(SEARCH_ERROR_PREFIX) {
            message
        } else {
            format!("{} {}", SEARCH_ERROR_PREFIX, message)
        };
        Self {
            text,
            is_error: true,
        }
    }
}

impl std::fmt::Display for SearchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Event broadcast by the graph executor to all subscribers.
#[derive(Debug, Clone)]
pub enum GraphEvent {
    /// A run started at the given entry node.
    RunStarted { run_id: RunId, entry: String },
    /// A node is about to be invoked.
    NodeStarted { run_id: RunId, node: String, step: usize },
    /// A node returned and its update was merged.
    NodeCompleted {
        run_id: RunId,
        node: String,
        step: usize,
        elapsed_ms: u64,
        next: String,
    },
    /// The run reached the terminal marker.
    RunComplete {
        run_id: RunId,
        total_steps: usize,
        elapsed_ms: u64,
    },
    /// The run stopped with an error.
    RunError { run_id: RunId, error: String },
}

impl GraphEvent {
    pub fn run_id(&self) -> &RunId {
        match self {
            Self::RunStarted { run_id, .. }
            | Self::NodeStarted { run_id, .. }
            | Self::NodeCompleted { run_id, .. }
            | Self::RunComplete { run_id, .. }
            | Self::RunError { run_id, .. } => run_id,
        }
    }
}
