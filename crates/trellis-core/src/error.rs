use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrellisError {
    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM streaming error: {0}")]
    LlmStream(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    // Graph errors
    #[error("Graph configuration error: {0}")]
    GraphConfig(String),

    #[error("Router for node '{from}' selected unknown node '{target}'")]
    UnknownNode { from: String, target: String },

    #[error("Node '{node}' failed: {message}")]
    NodeFailed { node: String, message: String },

    #[error("Run cancelled before node '{0}'")]
    Cancelled(String),

    // Config errors
    #[error("Provider not supported: {0}")]
    UnsupportedProvider(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TrellisError {
    /// Whether this error signals a broken graph wiring rather than a runtime condition.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::GraphConfig(_) | Self::UnknownNode { .. })
    }
}

pub type Result<T> = std::result::Result<T, TrellisError>;
