use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::{debug, info, warn};

use trellis_core::config::PevConfig;
use trellis_core::error::Result;
use trellis_core::structured::invoke_typed;
use trellis_core::traits::Reasoner;

use super::prompts;
use super::state::{HistoryEntry, PevState, PevUpdate};
use crate::graph::Node;

#[derive(Debug, Deserialize)]
struct Verdict {
    is_successful: bool,
    #[serde(default)]
    reasoning: String,
}

/// Classifies the last search result and records the outcome in history.
///
/// On failure the remaining plan is discarded so the router sends the run
/// back to the planner.
pub struct VerifierNode {
    reasoner: Arc<dyn Reasoner>,
    short_circuit_errors: bool,
}

impl VerifierNode {
    pub fn new(reasoner: Arc<dyn Reasoner>, config: &PevConfig) -> Self {
        Self {
            reasoner,
            short_circuit_errors: config.short_circuit_search_errors,
        }
    }

    async fn judge(&self, state: &PevState, result: &str) -> bool {
        let prompt = prompts::verify_prompt(&state.goal, state.last_step.as_deref(), result);
        match invoke_typed::<Verdict>(self.reasoner.as_ref(), prompt, prompts::verdict_schema()).await {
            Ok(verdict) => {
                debug!(
                    is_successful = verdict.is_successful,
                    reasoning = %verdict.reasoning,
                    "Verdict"
                );
                verdict.is_successful
            }
            Err(e) => {
                warn!(error = %e, "Verification call failed, treating result as failed");
                false
            }
        }
    }
}

impl Node<PevState> for VerifierNode {
    fn apply<'a>(&'a self, state: &'a PevState) -> BoxFuture<'a, Result<PevUpdate>> {
        Box::pin(async move {
            let Some(result) = &state.last_result else {
                debug!("Nothing to verify");
                return Ok(PevUpdate::default());
            };

            let successful = if result.is_error && self.short_circuit_errors {
                debug!("Search returned an error, skipping verification call");
                false
            } else {
                self.judge(state, &result.text).await
            };

            if successful {
                info!(step = ?state.last_step, "Step verified");
                return Ok(PevUpdate {
                    history: Some(PevUpdate::extended_history(
                        state,
                        HistoryEntry::Verified(result.text.clone()),
                    )),
                    ..Default::default()
                });
            }

            info!(step = ?state.last_step, "Step failed verification, discarding plan");
            let mut failed_steps = state.failed_steps.clone();
            if let Some(step) = &state.last_step {
                if !failed_steps.contains(step) {
                    failed_steps.push(step.clone());
                }
            }
            Ok(PevUpdate {
                plan: Some(Vec::new()),
                history: Some(PevUpdate::extended_history(
                    state,
                    HistoryEntry::verification_failed(&result.text),
                )),
                failed_steps: Some(failed_steps),
                ..Default::default()
            })
        })
    }
}
