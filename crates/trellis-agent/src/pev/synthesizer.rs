use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{info, warn};

use trellis_core::error::Result;
use trellis_core::traits::Reasoner;

use super::prompts;
use super::state::{PevState, PevUpdate};
use crate::graph::Node;

/// Writes the final answer from the verified results.
pub struct SynthesizerNode {
    reasoner: Arc<dyn Reasoner>,
}

impl SynthesizerNode {
    pub fn new(reasoner: Arc<dyn Reasoner>) -> Self {
        Self { reasoner }
    }
}

impl Node<PevState> for SynthesizerNode {
    fn apply<'a>(&'a self, state: &'a PevState) -> BoxFuture<'a, Result<PevUpdate>> {
        Box::pin(async move {
            // Retry exhaustion already wrote the answer.
            if state.final_answer.is_some() {
                return Ok(PevUpdate::default());
            }

            let answer = match self.reasoner.invoke(prompts::synthesize_prompt(state)).await {
                Ok(text) => {
                    info!(verified = state.verified_results().count(), "Final answer synthesized");
                    text.trim().to_string()
                }
                Err(e) => {
                    warn!(error = %e, "Synthesis failed");
                    format!("Error: Unable to synthesize a final answer: {}", e)
                }
            };

            Ok(PevUpdate {
                final_answer: Some(answer),
                ..Default::default()
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pev::state::HistoryEntry;
    use trellis_test_utils::ScriptedReasoner;

    #[tokio::test]
    async fn test_answer_from_history() {
        let reasoner = Arc::new(ScriptedReasoner::new().reply("  Paris.  "));
        let mut state = PevState::new("capital of France");
        state.history = vec![HistoryEntry::Verified("Paris is the capital".into())];

        let update = SynthesizerNode::new(reasoner.clone()).apply(&state).await.unwrap();
        assert_eq!(update.final_answer.as_deref(), Some("Paris."));
        assert!(reasoner.prompts()[0].contains("Paris is the capital"));
    }

    #[tokio::test]
    async fn test_existing_answer_kept() {
        let reasoner = Arc::new(ScriptedReasoner::new());
        let mut state = PevState::new("g");
        state.final_answer = Some("Error: Unable to complete task after multiple retries.".into());

        let update = SynthesizerNode::new(reasoner.clone()).apply(&state).await.unwrap();
        assert!(update.is_empty());
        assert_eq!(reasoner.calls(), 0);
    }

    #[tokio::test]
    async fn test_reasoner_failure_becomes_error_answer() {
        let reasoner = Arc::new(ScriptedReasoner::new().fail("HTTP 500"));
        let update = SynthesizerNode::new(reasoner)
            .apply(&PevState::new("g"))
            .await
            .unwrap();
        let answer = update.final_answer.unwrap();
        assert!(answer.starts_with("Error: Unable to synthesize a final answer:"));
        assert!(answer.contains("HTTP 500"));
    }
}
