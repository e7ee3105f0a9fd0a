//! Plan-Execute-Verify loop.
//!
//! ```text
//! plan -> execute -> verify -+-> execute      (steps left)
//!                            +-> plan         (last step failed)
//!                            +-> synthesize   (done, or out of attempts) -> END
//! ```
//!
//! The planner owns the retry ceiling, so the only cycle in the graph is
//! bounded at `max_planning_attempts + 1` planner visits.

pub mod execute;
pub mod planner;
pub mod prompts;
pub mod router;
pub mod state;
pub mod synthesizer;
pub mod verifier;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use trellis_core::config::PevConfig;
use trellis_core::error::Result;
use trellis_core::event::EventBus;
use trellis_core::traits::{Reasoner, SearchService};
use trellis_core::types::RunId;

use crate::graph::{ExecutionResult, GraphBuilder, GraphExecutor, END};

pub use execute::ExecuteNode;
pub use planner::PlannerNode;
pub use router::route_after_verify;
pub use state::{HistoryEntry, PevState, PevUpdate};
pub use synthesizer::SynthesizerNode;
pub use verifier::VerifierNode;

pub const PLAN: &str = "plan";
pub const EXECUTE: &str = "execute";
pub const VERIFY: &str = "verify";
pub const SYNTHESIZE: &str = "synthesize";

/// Wire the four PEV nodes into a graph.
pub fn build_graph(
    reasoner: Arc<dyn Reasoner>,
    search: Arc<dyn SearchService>,
    config: &PevConfig,
) -> Result<GraphExecutor<PevState>> {
    GraphBuilder::new()
        .add_node(PLAN, PlannerNode::new(reasoner.clone(), config.clone()))
        .add_node(EXECUTE, ExecuteNode::new(search))
        .add_node(VERIFY, VerifierNode::new(reasoner.clone(), config))
        .add_node(SYNTHESIZE, SynthesizerNode::new(reasoner))
        .add_edge(PLAN, EXECUTE)
        .add_edge(EXECUTE, VERIFY)
        .add_conditional_edge(VERIFY, |state: &PevState| {
            route_after_verify(state).to_string()
        })
        .add_edge(SYNTHESIZE, END)
        .set_entry(PLAN)
        .build()
}

/// Answers goals with the PEV graph.
///
/// Cheap to share behind an `Arc`; each run gets its own [`PevState`].
pub struct PevController {
    graph: GraphExecutor<PevState>,
}

impl PevController {
    pub fn new(
        reasoner: Arc<dyn Reasoner>,
        search: Arc<dyn SearchService>,
        config: PevConfig,
    ) -> Result<Self> {
        Ok(Self {
            graph: build_graph(reasoner, search, &config)?,
        })
    }

    /// Publish graph events for every run on `bus`.
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.graph = self.graph.with_events(bus);
        self
    }

    pub async fn run(&self, goal: &str) -> Result<ExecutionResult<PevState>> {
        self.graph.run(PevState::new(goal)).await
    }

    pub async fn run_with_cancel(
        &self,
        run_id: RunId,
        goal: &str,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult<PevState>> {
        self.graph
            .run_with_cancel(run_id, PevState::new(goal), cancel)
            .await
    }
}

impl ExecutionResult<PevState> {
    /// The final answer, or the empty string if none was produced.
    pub fn answer(&self) -> &str {
        self.state.final_answer.as_deref().unwrap_or_default()
    }
}
