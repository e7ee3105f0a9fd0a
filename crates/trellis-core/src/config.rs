use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrellisError};

/// Message stored in `final_answer` when planning attempts run out.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Error: Unable to complete task after multiple retries.";

/// Top-level Trellis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_workspace")]
    pub workspace: String,
    pub model: ModelConfig,
    #[serde(default)]
    pub fallback_models: Vec<ModelConfig>,
    #[serde(default)]
    pub pev: PevConfig,
    #[serde(default)]
    pub search: Option<SearchConfig>,
    #[serde(default)]
    pub log: Option<LogConfig>,
}

fn default_workspace() -> String { "~/.trellis".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Extra HTTP headers sent with every request.
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

fn default_provider() -> String { "openai".to_string() }
fn default_max_tokens() -> u32 { 4096 }
fn default_temperature() -> f32 { 0.0 }

/// Retry configuration for LLM requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

/// Plan-Execute-Verify loop policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PevConfig {
    /// Real planning calls allowed per run. The next planner visit is refused
    /// and ends the run with `failure_message`. Default: 4.
    #[serde(default = "default_max_planning_attempts")]
    pub max_planning_attempts: u32,
    /// Longest plan kept from the planner; extra steps are dropped. Default: 5.
    #[serde(default = "default_max_plan_steps")]
    pub max_plan_steps: usize,
    /// Classify search results flagged as errors without asking the reasoner.
    #[serde(default = "default_short_circuit")]
    pub short_circuit_search_errors: bool,
    #[serde(default = "default_failure_message")]
    pub failure_message: String,
}

impl Default for PevConfig {
    fn default() -> Self {
        Self {
            max_planning_attempts: default_max_planning_attempts(),
            max_plan_steps: default_max_plan_steps(),
            short_circuit_search_errors: default_short_circuit(),
            failure_message: default_failure_message(),
        }
    }
}

fn default_max_planning_attempts() -> u32 { 4 }
fn default_max_plan_steps() -> usize { 5 }
fn default_short_circuit() -> bool { true }
fn default_failure_message() -> String { DEFAULT_FAILURE_MESSAGE.to_string() }

/// Web search provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
    /// Queries containing any of these substrings fail with an error payload.
    /// Used to exercise the re-planning path against a live backend.
    #[serde(default)]
    pub fail_on: Vec<String>,
}

fn default_search_provider() -> String { "tavily".to_string() }
fn default_max_results() -> u32 { 5 }
fn default_search_timeout() -> u64 { 30 }

/// JSONL run logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Enable run logging (default: true when section is present).
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// Directory for log files. Default: <workspace>/logs
    #[serde(default)]
    pub log_dir: Option<String>,
    /// 1 = run start/end only, 2 = every node.
    #[serde(default = "default_log_level")]
    pub level: u8,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_dir: None,
            level: default_log_level(),
        }
    }
}

fn default_log_enabled() -> bool { true }
fn default_log_level() -> u8 { 2 }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| TrellisError::ConfigNotFound(path.display().to_string()))?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), model = %config.model.model_id, "Loaded config");
        Ok(config)
    }

    /// Parse config text, expanding `${ENV_VAR}` references first.
    pub fn from_toml(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        let config: Self =
            toml::from_str(&expanded).map_err(|e| TrellisError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the loop unable to terminate or plan.
    pub fn validate(&self) -> Result<()> {
        if self.pev.max_plan_steps == 0 {
            return Err(TrellisError::Config(
                "pev.max_plan_steps must be at least 1".into(),
            ));
        }
        if self.pev.failure_message.trim().is_empty() {
            return Err(TrellisError::Config(
                "pev.failure_message must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the workspace directory (expand ~).
    pub fn workspace_dir(&self) -> PathBuf {
        let ws = &self.workspace;
        if let Some(rest) = ws.strip_prefix("~/") {
            if let Some(home) = dirs_home() {
                return home.join(rest);
            }
        }
        PathBuf::from(ws)
    }

    /// Directory run logs are written to, if logging is enabled.
    pub fn log_dir(&self) -> Option<PathBuf> {
        let log = self.log.as_ref().filter(|l| l.enabled)?;
        Some(match &log.log_dir {
            Some(dir) => PathBuf::from(dir),
            None => self.workspace_dir().join("logs"),
        })
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                // Keep original if env var not set
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
