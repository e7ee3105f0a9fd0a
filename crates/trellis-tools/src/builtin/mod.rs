pub mod fault;
pub mod web_search;

pub use fault::FaultInjectingSearch;
pub use web_search::TavilySearch;
