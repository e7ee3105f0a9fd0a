use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::{info, warn};

use trellis_core::config::PevConfig;
use trellis_core::error::Result;
use trellis_core::structured::invoke_typed;
use trellis_core::traits::Reasoner;

use super::prompts;
use super::state::{HistoryEntry, PevState, PevUpdate};
use crate::graph::Node;

#[derive(Debug, Deserialize)]
struct PlanReply {
    steps: Vec<String>,
}

/// Produces the list of search steps still needed for the goal.
///
/// Owns the retry ceiling: once `max_planning_attempts` real plans have been
/// made, the next visit ends the run with the configured failure message.
pub struct PlannerNode {
    reasoner: Arc<dyn Reasoner>,
    config: PevConfig,
}

impl PlannerNode {
    pub fn new(reasoner: Arc<dyn Reasoner>, config: PevConfig) -> Self {
        Self { reasoner, config }
    }

    /// Trim, drop steps that already failed, and cap the length.
    fn bound(&self, steps: Vec<String>, failed: &[String]) -> Vec<String> {
        let mut plan: Vec<String> = steps
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .filter(|s| {
                let repeat = failed.iter().any(|f| f == s);
                if repeat {
                    info!(step = %s, "Dropping step that already failed verification");
                }
                !repeat
            })
            .collect();

        if plan.len() > self.config.max_plan_steps {
            warn!(
                steps = plan.len(),
                max = self.config.max_plan_steps,
                "Plan too long, truncating"
            );
            plan.truncate(self.config.max_plan_steps);
        }
        plan
    }
}

impl Node<PevState> for PlannerNode {
    fn apply<'a>(&'a self, state: &'a PevState) -> BoxFuture<'a, Result<PevUpdate>> {
        Box::pin(async move {
            if state.retry_count >= self.config.max_planning_attempts {
                warn!(
                    attempts = state.retry_count,
                    "Planning attempts exhausted, giving up"
                );
                return Ok(PevUpdate {
                    plan: Some(Vec::new()),
                    last_step: Some(None),
                    last_result: Some(None),
                    final_answer: Some(self.config.failure_message.clone()),
                    ..Default::default()
                });
            }

            let attempt = state.retry_count + 1;
            let mut update = PevUpdate {
                retry_count: Some(attempt),
                last_step: Some(None),
                last_result: Some(None),
                ..Default::default()
            };

            let prompt = prompts::plan_prompt(state, self.config.max_plan_steps);
            let schema = prompts::plan_schema(self.config.max_plan_steps);
            match invoke_typed::<PlanReply>(self.reasoner.as_ref(), prompt, schema).await {
                Ok(reply) => {
                    let plan = self.bound(reply.steps, &state.failed_steps);
                    info!(attempt, steps = plan.len(), "Plan created");
                    update.plan = Some(plan);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Planning failed");
                    update.plan = Some(Vec::new());
                    update.history = Some(PevUpdate::extended_history(
                        state,
                        HistoryEntry::planning_failed(&e.to_string()),
                    ));
                }
            }
            Ok(update)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trellis_core::config::DEFAULT_FAILURE_MESSAGE;
    use trellis_core::types::SearchOutcome;
    use trellis_test_utils::ScriptedReasoner;

    fn planner(reasoner: Arc<ScriptedReasoner>) -> PlannerNode {
        PlannerNode::new(reasoner, PevConfig::default())
    }

    #[tokio::test]
    async fn test_first_plan_increments_retry_count() {
        let reasoner = Arc::new(ScriptedReasoner::new().reply_json(json!({"steps": ["a", "b"]})));
        let mut state = PevState::new("goal");
        state.last_step = Some("stale".into());
        state.last_result = Some(SearchOutcome::success("stale"));

        let update = planner(reasoner.clone()).apply(&state).await.unwrap();
        assert_eq!(update.plan, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(update.retry_count, Some(1));
        assert_eq!(update.last_step, Some(None));
        assert_eq!(update.last_result, Some(None));
        assert!(update.history.is_none());
        assert_eq!(reasoner.calls(), 1);
        assert!(reasoner.prompts()[0].contains("goal"));
    }

    #[tokio::test]
    async fn test_ceiling_refuses_without_calling_reasoner() {
        let reasoner = Arc::new(ScriptedReasoner::new());
        let mut state = PevState::new("goal");
        state.retry_count = 4;
        state.last_result = Some(SearchOutcome::error("down"));

        let update = planner(reasoner.clone()).apply(&state).await.unwrap();
        assert_eq!(update.plan, Some(vec![]));
        assert_eq!(update.final_answer.as_deref(), Some(DEFAULT_FAILURE_MESSAGE));
        assert_eq!(update.last_result, Some(None));
        assert!(update.retry_count.is_none());
        assert_eq!(reasoner.calls(), 0);
    }

    #[tokio::test]
    async fn test_long_plan_truncated() {
        let reasoner = Arc::new(
            ScriptedReasoner::new()
                .reply_json(json!({"steps": ["1", "2", "3", "4", "5", "6", "7"]})),
        );
        let update = planner(reasoner).apply(&PevState::new("g")).await.unwrap();
        assert_eq!(update.plan.unwrap(), vec!["1", "2", "3", "4", "5"]);
    }

    #[tokio::test]
    async fn test_failed_steps_not_repeated() {
        let reasoner = Arc::new(
            ScriptedReasoner::new().reply_json(json!({"steps": ["weather paris", "  ", "paris population"]})),
        );
        let mut state = PevState::new("g");
        state.failed_steps = vec!["weather paris".into()];
        state.history = vec![HistoryEntry::verification_failed("Error: x")];
        state.retry_count = 1;

        let update = planner(reasoner.clone()).apply(&state).await.unwrap();
        assert_eq!(update.plan.unwrap(), vec!["paris population"]);
        assert_eq!(update.retry_count, Some(2));
        assert!(reasoner.prompts()[0].contains("Verification Failed: Error: x"));
    }

    #[tokio::test]
    async fn test_malformed_reply_records_planning_failure() {
        let reasoner = Arc::new(ScriptedReasoner::new().reply("I would search for things"));
        let mut state = PevState::new("g");
        state.history = vec![HistoryEntry::Verified("earlier".into())];

        let update = planner(reasoner).apply(&state).await.unwrap();
        assert_eq!(update.plan, Some(vec![]));
        assert_eq!(update.retry_count, Some(1));
        let history = update.history.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], HistoryEntry::Verified("earlier".into()));
        assert!(history[1].is_failure());
        assert!(history[1].text().starts_with("Planning Failed: "));
    }

    #[tokio::test]
    async fn test_reasoner_error_records_planning_failure() {
        let reasoner = Arc::new(ScriptedReasoner::new().fail("HTTP 503"));
        let update = planner(reasoner).apply(&PevState::new("g")).await.unwrap();
        let history = update.history.unwrap();
        assert!(history[0].text().contains("HTTP 503"));
    }
}
