use std::collections::HashMap;
use std::sync::Arc;

use trellis_core::error::{Result, TrellisError};

use super::executor::GraphExecutor;
use super::node::{Node, Router, Transition};
use super::{GraphState, END};

/// Assembles a [`GraphExecutor`] and checks its wiring.
///
/// Registration never fails; every problem is collected and reported by
/// [`GraphBuilder::build`] as a single `GraphConfig` error.
pub struct GraphBuilder<S: GraphState> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    order: Vec<String>,
    transitions: HashMap<String, Transition<S>>,
    entry: Option<String>,
    problems: Vec<String>,
}

impl<S: GraphState> Default for GraphBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: GraphState> GraphBuilder<S> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            order: Vec::new(),
            transitions: HashMap::new(),
            entry: None,
            problems: Vec::new(),
        }
    }

    /// Register a node under `name`.
    pub fn add_node(mut self, name: impl Into<String>, node: impl Node<S> + 'static) -> Self {
        let name = name.into();
        if name == END {
            self.problems
                .push(format!("'{}' is reserved for the terminal marker", END));
        } else if self.nodes.contains_key(&name) {
            self.problems.push(format!("node '{}' registered twice", name));
        } else {
            self.order.push(name.clone());
            self.nodes.insert(name, Arc::new(node));
        }
        self
    }

    /// Always continue from `from` to `to` (a node name or [`END`]).
    pub fn add_edge(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.transition(from.into(), Transition::Fixed(to.into()))
    }

    /// Let `router` pick the successor of `from` after its update is merged.
    pub fn add_conditional_edge(
        self,
        from: impl Into<String>,
        router: impl Router<S> + 'static,
    ) -> Self {
        self.transition(from.into(), Transition::Conditional(Arc::new(router)))
    }

    pub fn set_entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    fn transition(mut self, from: String, transition: Transition<S>) -> Self {
        if self.transitions.contains_key(&from) {
            self.problems
                .push(format!("node '{}' has more than one outgoing transition", from));
        } else {
            self.transitions.insert(from, transition);
        }
        self
    }

    /// Validate the wiring and produce an executor.
    pub fn build(self) -> Result<GraphExecutor<S>> {
        let mut problems = self.problems;

        let entry = match self.entry {
            Some(entry) if self.nodes.contains_key(&entry) => entry,
            Some(entry) => {
                problems.push(format!("entry node '{}' does not exist", entry));
                entry
            }
            None => {
                problems.push("no entry node set".to_string());
                String::new()
            }
        };

        for name in &self.order {
            if !self.transitions.contains_key(name) {
                problems.push(format!("node '{}' has no outgoing transition", name));
            }
        }

        // Sorted so the error text does not depend on hash order.
        let mut sources: Vec<&String> = self.transitions.keys().collect();
        sources.sort();
        for from in sources {
            if !self.nodes.contains_key(from) {
                problems.push(format!("transition from unknown node '{}'", from));
            }
            if let Some(Transition::Fixed(to)) = self.transitions.get(from) {
                if to != END && !self.nodes.contains_key(to) {
                    problems.push(format!("edge '{}' -> '{}' targets unknown node", from, to));
                }
            }
        }

        if !problems.is_empty() {
            return Err(TrellisError::GraphConfig(problems.join("; ")));
        }

        Ok(GraphExecutor::new(self.nodes, self.transitions, entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::FnNode;

    #[derive(Default)]
    struct Log(Vec<&'static str>);

    impl GraphState for Log {
        type Update = &'static str;
        fn merge(&mut self, update: &'static str) {
            self.0.push(update);
        }
    }

    fn step(tag: &'static str) -> FnNode<impl Fn(&Log) -> Result<&'static str> + Send + Sync> {
        FnNode(move |_: &Log| Ok(tag))
    }

    fn config_error(result: Result<GraphExecutor<Log>>) -> String {
        match result {
            Err(TrellisError::GraphConfig(msg)) => msg,
            Err(other) => panic!("expected GraphConfig, got {:?}", other),
            Ok(_) => panic!("expected GraphConfig, got a graph"),
        }
    }

    #[test]
    fn test_valid_graph_builds() {
        let graph = GraphBuilder::new()
            .add_node("a", step("a"))
            .add_node("b", step("b"))
            .add_edge("a", "b")
            .add_conditional_edge("b", |_: &Log| END.to_string())
            .set_entry("a")
            .build();
        assert!(graph.is_ok());
    }

    #[test]
    fn test_missing_entry() {
        let msg = config_error(
            GraphBuilder::new()
                .add_node("a", step("a"))
                .add_edge("a", END)
                .build(),
        );
        assert!(msg.contains("no entry node"));

        let msg = config_error(
            GraphBuilder::new()
                .add_node("a", step("a"))
                .add_edge("a", END)
                .set_entry("z")
                .build(),
        );
        assert!(msg.contains("entry node 'z' does not exist"));
    }

    #[test]
    fn test_node_without_transition() {
        let msg = config_error(
            GraphBuilder::new()
                .add_node("a", step("a"))
                .add_node("b", step("b"))
                .add_edge("a", "b")
                .set_entry("a")
                .build(),
        );
        assert!(msg.contains("node 'b' has no outgoing transition"));
    }

    #[test]
    fn test_two_transitions_rejected() {
        let msg = config_error(
            GraphBuilder::new()
                .add_node("a", step("a"))
                .add_edge("a", END)
                .add_conditional_edge("a", |_: &Log| END.to_string())
                .set_entry("a")
                .build(),
        );
        assert!(msg.contains("more than one outgoing transition"));
    }

    #[test]
    fn test_fixed_edge_to_unknown_node() {
        let msg = config_error(
            GraphBuilder::new()
                .add_node("a", step("a"))
                .add_edge("a", "ghost")
                .set_entry("a")
                .build(),
        );
        assert!(msg.contains("'a' -> 'ghost'"));
    }

    #[test]
    fn test_reserved_and_duplicate_names() {
        let msg = config_error(
            GraphBuilder::new()
                .add_node(END, step("x"))
                .add_node("a", step("a"))
                .add_node("a", step("a2"))
                .add_edge("a", END)
                .set_entry("a")
                .build(),
        );
        assert!(msg.contains("reserved"));
        assert!(msg.contains("registered twice"));
    }
}
