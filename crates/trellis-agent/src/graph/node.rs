use std::sync::Arc;

use futures::future::BoxFuture;

use trellis_core::error::Result;

use super::GraphState;

/// One step of a workflow: reads the current state, returns a partial update.
pub trait Node<S: GraphState>: Send + Sync {
    fn apply<'a>(&'a self, state: &'a S) -> BoxFuture<'a, Result<S::Update>>;
}

/// Chooses the next node from the merged state. Must be pure.
pub trait Router<S>: Send + Sync {
    fn decide(&self, state: &S) -> String;
}

impl<S, F> Router<S> for F
where
    F: Fn(&S) -> String + Send + Sync,
{
    fn decide(&self, state: &S) -> String {
        self(state)
    }
}

/// How execution leaves a node.
pub enum Transition<S> {
    /// Always go to the named node (or [`END`](super::END)).
    Fixed(String),
    /// Ask a router after the node's update is merged.
    Conditional(Arc<dyn Router<S>>),
}

impl<S> Clone for Transition<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Fixed(target) => Self::Fixed(target.clone()),
            Self::Conditional(router) => Self::Conditional(Arc::clone(router)),
        }
    }
}

impl<S> std::fmt::Debug for Transition<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed(target) => f.debug_tuple("Fixed").field(target).finish(),
            Self::Conditional(_) => f.write_str("Conditional(..)"),
        }
    }
}

/// Synchronous node built from a closure. Handy for glue steps and tests.
pub struct FnNode<F>(pub F);

impl<S, F> Node<S> for FnNode<F>
where
    S: GraphState,
    F: Fn(&S) -> Result<S::Update> + Send + Sync,
{
    fn apply<'a>(&'a self, state: &'a S) -> BoxFuture<'a, Result<S::Update>> {
        let update = (self.0)(state);
        Box::pin(async move { update })
    }
}
