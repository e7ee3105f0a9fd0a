use serde::{Deserialize, Serialize};

use trellis_core::types::SearchOutcome;

use crate::graph::GraphState;

/// One line of the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum HistoryEntry {
    /// A search result the verifier accepted.
    Verified(String),
    /// A failure note. The text carries its own prefix.
    Failed(String),
}

impl HistoryEntry {
    pub fn verification_failed(result: &str) -> Self {
        Self::Failed(format!("Verification Failed: {}", result))
    }

    pub fn planning_failed(reason: &str) -> Self {
        Self::Failed(format!("Planning Failed: {}", reason))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Verified(text) | Self::Failed(text) => text,
        }
    }
}

impl std::fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

/// State threaded through the Plan-Execute-Verify graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PevState {
    pub goal: String,
    /// Pending steps, next first.
    pub plan: Vec<String>,
    /// Step most recently sent to search.
    pub last_step: Option<String>,
    pub last_result: Option<SearchOutcome>,
    /// Append-only.
    pub history: Vec<HistoryEntry>,
    /// Step texts that failed verification, in failure order.
    pub failed_steps: Vec<String>,
    pub final_answer: Option<String>,
    /// Real planning calls made so far.
    pub retry_count: u32,
}

impl PevState {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            ..Self::default()
        }
    }

    /// Whether the newest history entry is a failure note.
    pub fn last_attempt_failed(&self) -> bool {
        self.history.last().is_some_and(HistoryEntry::is_failure)
    }

    pub fn verified_results(&self) -> impl Iterator<Item = &str> {
        self.history.iter().filter_map(|entry| match entry {
            HistoryEntry::Verified(text) => Some(text.as_str()),
            HistoryEntry::Failed(_) => None,
        })
    }
}

/// Fields a node sets. `None` leaves the field alone; the nested option on
/// clearable fields distinguishes "clear" from "keep".
///
/// Sequences are replaced wholesale, so a node extending `history` returns
/// the full extended list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PevUpdate {
    pub plan: Option<Vec<String>>,
    pub last_step: Option<Option<String>>,
    pub last_result: Option<Option<SearchOutcome>>,
    pub history: Option<Vec<HistoryEntry>>,
    pub failed_steps: Option<Vec<String>>,
    pub final_answer: Option<String>,
    pub retry_count: Option<u32>,
}

impl PevUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// `history` with `entry` appended.
    pub(crate) fn extended_history(state: &PevState, entry: HistoryEntry) -> Vec<HistoryEntry> {
        let mut history = Vec::with_capacity(state.history.len() + 1);
        history.extend(state.history.iter().cloned());
        history.push(entry);
        history
    }
}

impl GraphState for PevState {
    type Update = PevUpdate;

    fn merge(&mut self, update: PevUpdate) {
        if let Some(plan) = update.plan {
            self.plan = plan;
        }
        if let Some(last_step) = update.last_step {
            self.last_step = last_step;
        }
        if let Some(last_result) = update.last_result {
            self.last_result = last_result;
        }
        if let Some(history) = update.history {
            self.history = history;
        }
        if let Some(failed_steps) = update.failed_steps {
            self.failed_steps = failed_steps;
        }
        if let Some(final_answer) = update.final_answer {
            self.final_answer = Some(final_answer);
        }
        if let Some(retry_count) = update.retry_count {
            self.retry_count = retry_count;
        }
    }
}
