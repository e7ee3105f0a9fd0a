use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::info;

use trellis_core::error::Result;
use trellis_core::traits::SearchService;

use super::state::{PevState, PevUpdate};
use crate::graph::Node;

/// Pops the next step off the plan and runs it through search.
///
/// Does not judge the result; that is the verifier's job.
pub struct ExecuteNode {
    search: Arc<dyn SearchService>,
}

impl ExecuteNode {
    pub fn new(search: Arc<dyn SearchService>) -> Self {
        Self { search }
    }
}

impl Node<PevState> for ExecuteNode {
    fn apply<'a>(&'a self, state: &'a PevState) -> BoxFuture<'a, Result<PevUpdate>> {
        Box::pin(async move {
            let Some((step, rest)) = state.plan.split_first() else {
                return Ok(PevUpdate::default());
            };

            let outcome = self.search.invoke(step.clone()).await;
            info!(
                backend = self.search.name(),
                step = %step,
                is_error = outcome.is_error,
                remaining = rest.len(),
                "Step executed"
            );

            Ok(PevUpdate {
                plan: Some(rest.to_vec()),
                last_step: Some(Some(step.clone())),
                last_result: Some(Some(outcome)),
                ..Default::default()
            })
        })
    }
}
