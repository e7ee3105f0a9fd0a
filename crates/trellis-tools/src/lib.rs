pub mod builtin;
pub mod registry;

pub use builtin::{FaultInjectingSearch, TavilySearch};
pub use registry::create_search;
