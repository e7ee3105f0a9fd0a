pub mod graph;
pub mod pev;
pub mod run_log;

pub use graph::{
    ExecutionResult, GraphBuilder, GraphExecutor, GraphState, Node, NodeRecord, Router,
    Transition, END,
};
pub use pev::{HistoryEntry, PevController, PevState, PevUpdate};
pub use run_log::RunLogger;
