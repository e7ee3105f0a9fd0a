use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use trellis_core::error::{Result, TrellisError};
use trellis_core::event::EventBus;
use trellis_core::types::{GraphEvent, RunId};

use super::node::{Node, Transition};
use super::{GraphState, END};

/// One node visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    /// Which node ran.
    pub node: String,
    /// Where execution went next ([`END`] for the last record).
    pub next: String,
    pub elapsed_ms: u64,
}

/// Result of running a graph to [`END`].
#[derive(Debug, Clone)]
pub struct ExecutionResult<S> {
    pub run_id: RunId,
    /// State after the last merge.
    pub state: S,
    /// Node visits in execution order.
    pub trace: Vec<NodeRecord>,
    pub total_elapsed_ms: u64,
}

impl<S> ExecutionResult<S> {
    /// Node names in visit order.
    pub fn path(&self) -> Vec<&str> {
        self.trace.iter().map(|r| r.node.as_str()).collect()
    }

    /// How many times `node` ran.
    pub fn visits(&self, node: &str) -> usize {
        self.trace.iter().filter(|r| r.node == node).count()
    }
}

/// Runs a validated workflow graph.
///
/// Holds no per-run state: one executor can serve concurrent runs, each with
/// its own state value. Built through [`GraphBuilder`](super::GraphBuilder).
pub struct GraphExecutor<S: GraphState> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    transitions: HashMap<String, Transition<S>>,
    entry: String,
    events: Option<Arc<EventBus>>,
}

impl<S: GraphState> GraphExecutor<S> {
    pub(crate) fn new(
        nodes: HashMap<String, Arc<dyn Node<S>>>,
        transitions: HashMap<String, Transition<S>>,
        entry: String,
    ) -> Self {
        Self {
            nodes,
            transitions,
            entry,
            events: None,
        }
    }

    /// Publish a [`GraphEvent`] for every run and node on `bus`.
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Run from the entry node until a transition yields [`END`].
    pub async fn run(&self, state: S) -> Result<ExecutionResult<S>> {
        self.run_with_cancel(RunId::new(), state, &CancellationToken::new())
            .await
    }

    /// Like [`run`](Self::run), checking `cancel` before each node.
    ///
    /// There is no visit limit: a cycle ends only when a router leaves it.
    pub async fn run_with_cancel(
        &self,
        run_id: RunId,
        state: S,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult<S>> {
        self.publish(GraphEvent::RunStarted {
            run_id: run_id.clone(),
            entry: self.entry.clone(),
        });

        match self.drive(&run_id, state, cancel).await {
            Ok(result) => {
                info!(
                    run_id = %run_id,
                    steps = result.trace.len(),
                    elapsed_ms = result.total_elapsed_ms,
                    "Graph run complete"
                );
                self.publish(GraphEvent::RunComplete {
                    run_id,
                    total_steps: result.trace.len(),
                    elapsed_ms: result.total_elapsed_ms,
                });
                Ok(result)
            }
            Err(e) => {
                error!(run_id = %run_id, error = %e, "Graph run failed");
                self.publish(GraphEvent::RunError {
                    run_id,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        run_id: &RunId,
        mut state: S,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult<S>> {
        let start = Instant::now();
        let mut trace = Vec::new();
        let mut current = self.entry.clone();

        loop {
            if cancel.is_cancelled() {
                return Err(TrellisError::Cancelled(current));
            }

            let (node, transition) = match (self.nodes.get(&current), self.transitions.get(&current)) {
                (Some(node), Some(transition)) => (node, transition),
                _ => {
                    return Err(TrellisError::GraphConfig(format!(
                        "node '{}' not found in graph",
                        current
                    )))
                }
            };

            let step = trace.len();
            debug!(run_id = %run_id, node = %current, step, "Executing graph node");
            self.publish(GraphEvent::NodeStarted {
                run_id: run_id.clone(),
                node: current.clone(),
                step,
            });

            let node_start = Instant::now();
            let update = node
                .apply(&state)
                .await
                .map_err(|e| TrellisError::NodeFailed {
                    node: current.clone(),
                    message: e.to_string(),
                })?;
            state.merge(update);

            let next = match transition {
                Transition::Fixed(target) => target.clone(),
                Transition::Conditional(router) => router.decide(&state),
            };
            if next != END && !self.nodes.contains_key(&next) {
                return Err(TrellisError::UnknownNode {
                    from: current,
                    target: next,
                });
            }

            let elapsed_ms = node_start.elapsed().as_millis() as u64;
            debug!(
                run_id = %run_id,
                node = %current,
                next = %next,
                elapsed_ms,
                "Node execution complete"
            );
            self.publish(GraphEvent::NodeCompleted {
                run_id: run_id.clone(),
                node: current.clone(),
                step,
                elapsed_ms,
                next: next.clone(),
            });
            trace.push(NodeRecord {
                node: current,
                next: next.clone(),
                elapsed_ms,
            });

            if next == END {
                break;
            }
            current = next;
        }

        Ok(ExecutionResult {
            run_id: run_id.clone(),
            state,
            trace,
            total_elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn publish(&self, event: GraphEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::FnNode;
    use crate::graph::GraphBuilder;

    use futures::future::BoxFuture;

    /// Appends node tags; `count` drives the loop router.
    #[derive(Debug, Default, Clone)]
    struct Walk {
        visited: Vec<String>,
        count: u32,
    }

    impl GraphState for Walk {
        type Update = (String, u32);
        fn merge(&mut self, (tag, inc): (String, u32)) {
            self.visited.push(tag);
            self.count += inc;
        }
    }

    fn tag(name: &'static str, inc: u32) -> FnNode<impl Fn(&Walk) -> Result<(String, u32)> + Send + Sync> {
        FnNode(move |_: &Walk| Ok((name.to_string(), inc)))
    }

    struct Failing;

    impl Node<Walk> for Failing {
        fn apply<'a>(&'a self, _state: &'a Walk) -> BoxFuture<'a, Result<(String, u32)>> {
            Box::pin(async { Err(TrellisError::LlmRequest("HTTP 500".into())) })
        }
    }

    #[tokio::test]
    async fn test_straight_line_pipeline() {
        let graph = GraphBuilder::new()
            .add_node("research", tag("research", 0))
            .add_node("write", tag("write", 0))
            .add_node("review", tag("review", 0))
            .add_edge("research", "write")
            .add_edge("write", "review")
            .add_edge("review", END)
            .set_entry("research")
            .build()
            .unwrap();

        let result = graph.run(Walk::default()).await.unwrap();
        assert_eq!(result.state.visited, vec!["research", "write", "review"]);
        assert_eq!(result.path(), vec!["research", "write", "review"]);
        assert_eq!(result.trace.last().unwrap().next, END);
    }

    #[tokio::test]
    async fn test_router_sees_merged_state() {
        let graph = GraphBuilder::new()
            .add_node("tick", tag("tick", 1))
            .add_node("done", tag("done", 0))
            .add_conditional_edge("tick", |s: &Walk| {
                if s.count >= 3 { "done".to_string() } else { "tick".to_string() }
            })
            .add_edge("done", END)
            .set_entry("tick")
            .build()
            .unwrap();

        let result = graph.run(Walk::default()).await.unwrap();
        assert_eq!(result.visits("tick"), 3);
        assert_eq!(result.visits("done"), 1);
        assert_eq!(result.state.count, 3);
    }

    #[tokio::test]
    async fn test_reason_act_loop_ends_from_router() {
        // reason -> (tool | END), tool -> reason
        let graph = GraphBuilder::new()
            .add_node("reason", tag("reason", 0))
            .add_node("tool", tag("tool", 1))
            .add_conditional_edge("reason", |s: &Walk| {
                if s.count < 2 { "tool".to_string() } else { END.to_string() }
            })
            .add_edge("tool", "reason")
            .set_entry("reason")
            .build()
            .unwrap();

        let result = graph.run(Walk::default()).await.unwrap();
        assert_eq!(
            result.path(),
            vec!["reason", "tool", "reason", "tool", "reason"]
        );
        assert_eq!(result.trace.last().unwrap().next, END);
    }

    #[tokio::test]
    async fn test_unknown_router_target_is_fatal() {
        let graph = GraphBuilder::new()
            .add_node("a", tag("a", 0))
            .add_conditional_edge("a", |_: &Walk| "nowhere".to_string())
            .set_entry("a")
            .build()
            .unwrap();

        let err = graph.run(Walk::default()).await.unwrap_err();
        assert!(err.is_configuration());
        match err {
            TrellisError::UnknownNode { from, target } => {
                assert_eq!(from, "a");
                assert_eq!(target, "nowhere");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_node_error_names_the_node() {
        let graph = GraphBuilder::new()
            .add_node("a", tag("a", 0))
            .add_node("boom", Failing)
            .add_edge("a", "boom")
            .add_edge("boom", END)
            .set_entry("a")
            .build()
            .unwrap();

        match graph.run(Walk::default()).await.unwrap_err() {
            TrellisError::NodeFailed { node, message } => {
                assert_eq!(node, "boom");
                assert!(message.contains("HTTP 500"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_first_node() {
        let graph = GraphBuilder::new()
            .add_node("a", tag("a", 0))
            .add_edge("a", END)
            .set_entry("a")
            .build()
            .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = graph
            .run_with_cancel(RunId::new(), Walk::default(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, TrellisError::Cancelled(ref node) if node == "a"));
    }

    #[tokio::test]
    async fn test_events_published_in_order() {
        let bus = Arc::new(EventBus::new(32));
        let mut rx = bus.subscribe();
        let graph = GraphBuilder::new()
            .add_node("a", tag("a", 0))
            .add_node("b", tag("b", 0))
            .add_edge("a", "b")
            .add_edge("b", END)
            .set_entry("a")
            .build()
            .unwrap()
            .with_events(bus);

        let run_id = RunId::from_str("run-1");
        graph
            .run_with_cancel(run_id.clone(), Walk::default(), &CancellationToken::new())
            .await
            .unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.run_id(), &run_id);
            kinds.push(match event {
                GraphEvent::RunStarted { .. } => "start".to_string(),
                GraphEvent::NodeStarted { node, .. } => format!("enter:{}", node),
                GraphEvent::NodeCompleted { node, next, .. } => format!("{}->{}", node, next),
                GraphEvent::RunComplete { total_steps, .. } => format!("complete:{}", total_steps),
                GraphEvent::RunError { .. } => "error".to_string(),
            });
        }
        assert_eq!(
            kinds,
            vec![
                "start".to_string(),
                "enter:a".to_string(),
                "a->b".to_string(),
                "enter:b".to_string(),
                format!("b->{}", END),
                "complete:2".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_shared_executor_serves_independent_runs() {
        let graph = Arc::new(
            GraphBuilder::new()
                .add_node("tick", tag("tick", 1))
                .add_conditional_edge("tick", |s: &Walk| {
                    if s.count >= 2 { END.to_string() } else { "tick".to_string() }
                })
                .set_entry("tick")
                .build()
                .unwrap(),
        );

        let (a, b) = tokio::join!(graph.run(Walk::default()), graph.run(Walk::default()));
        assert_eq!(a.unwrap().state.count, 2);
        assert_eq!(b.unwrap().state.count, 2);
    }
}
