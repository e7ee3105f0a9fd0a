//! Fixed prompt templates and response schemas for the PEV nodes.

use super::state::PevState;

pub fn plan_schema(max_steps: usize) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "steps": {
                "type": "array",
                "items": {"type": "string"},
                "maxItems": max_steps,
                "description": "Search queries to run, in order"
            }
        },
        "required": ["steps"]
    })
}

pub fn verdict_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "is_successful": {"type": "boolean"},
            "reasoning": {"type": "string"}
        },
        "required": ["is_successful", "reasoning"]
    })
}

pub fn plan_prompt(state: &PevState, max_steps: usize) -> String {
    let mut prompt = format!(
        "You are a research planner. Create a step-by-step plan of at most {} web \
         search queries that together answer the goal.\n\n## Goal\n{}\n",
        max_steps, state.goal
    );

    if !state.history.is_empty() {
        prompt.push_str("\n## Progress so far\n");
        for entry in &state.history {
            prompt.push_str(&format!("- {}\n", entry));
        }
    }

    if !state.failed_steps.is_empty() {
        prompt.push_str("\n## Queries that already failed (do not repeat them)\n");
        for step in &state.failed_steps {
            prompt.push_str(&format!("- {}\n", step));
        }
    }

    prompt.push_str("\nReturn only the steps still needed.");
    prompt
}

pub fn verify_prompt(goal: &str, step: Option<&str>, result: &str) -> String {
    format!(
        "You are checking a search result. Assess whether the result below is \
         relevant and usable for the goal. Error messages, empty results and \
         off-topic text are not successful.\n\n## Goal\n{}\n\n## Query\n{}\n\n\
         ## Result\n{}",
        goal,
        step.unwrap_or("(unknown)"),
        result
    )
}

pub fn synthesize_prompt(state: &PevState) -> String {
    let mut prompt = format!(
        "Write the final answer to the goal using the verified research \
         results. Failure notes are context only; do not present them as \
         findings.\n\n## Goal\n{}\n\n## Research\n",
        state.goal
    );
    if state.history.is_empty() {
        prompt.push_str("(no results)\n");
    }
    for entry in &state.history {
        let label = if entry.is_failure() { "note" } else { "result" };
        prompt.push_str(&format!("- [{}] {}\n", label, entry));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pev::state::HistoryEntry;

    #[test]
    fn test_plan_prompt_carries_history_and_failures() {
        let mut state = PevState::new("compare tokio and async-std");
        state.history.push(HistoryEntry::verification_failed("Error: timeout"));
        state.failed_steps.push("tokio benchmarks".into());

        let prompt = plan_prompt(&state, 5);
        assert!(prompt.contains("at most 5"));
        assert!(prompt.contains("compare tokio and async-std"));
        assert!(prompt.contains("- Verification Failed: Error: timeout"));
        assert!(prompt.contains("- tokio benchmarks"));
    }

    #[test]
    fn test_first_plan_prompt_has_no_progress_section() {
        let prompt = plan_prompt(&PevState::new("g"), 3);
        assert!(!prompt.contains("Progress so far"));
        assert!(!prompt.contains("already failed"));
    }

    #[test]
    fn test_synthesize_prompt_labels_entries() {
        let mut state = PevState::new("g");
        state.history.push(HistoryEntry::Verified("Paris".into()));
        state.history.push(HistoryEntry::verification_failed("Error: x"));
        let prompt = synthesize_prompt(&state);
        assert!(prompt.contains("- [result] Paris"));
        assert!(prompt.contains("- [note] Verification Failed: Error: x"));
    }

    #[test]
    fn test_plan_schema_bounds_steps() {
        assert_eq!(plan_schema(4)["properties"]["steps"]["maxItems"], 4);
    }
}
