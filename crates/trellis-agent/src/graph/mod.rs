//! Workflow graph engine.
//!
//! A workflow is a set of named [`Node`]s threading one typed state value.
//! Every node has exactly one outgoing [`Transition`]: a fixed successor or a
//! [`Router`] that inspects the merged state. The [`GraphExecutor`] starts at
//! the entry node and follows transitions until one yields [`END`].
//!
//! Nodes never mutate state directly. They return a partial update which the
//! executor folds in through [`GraphState::merge`], so every change to the
//! state is visible in one place.

pub mod builder;
pub mod executor;
pub mod node;

pub use builder::GraphBuilder;
pub use executor::{ExecutionResult, GraphExecutor, NodeRecord};
pub use node::{FnNode, Node, Router, Transition};

/// Terminal marker. Reserved; no node may use this name.
pub const END: &str = "__end__";

/// State threaded through a workflow.
pub trait GraphState: Send + Sync + 'static {
    /// Partial update produced by one node.
    type Update: Send + 'static;

    /// Fold a node's update into the state.
    fn merge(&mut self, update: Self::Update);
}
