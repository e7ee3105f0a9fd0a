use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::info;

use trellis_core::traits::SearchService;
use trellis_core::types::SearchOutcome;

/// Wraps a search backend and fails every query containing one of the
/// configured substrings (case-insensitive), without calling the backend.
pub struct FaultInjectingSearch {
    inner: Arc<dyn SearchService>,
    fail_on: Vec<String>,
}

impl FaultInjectingSearch {
    pub fn new(inner: Arc<dyn SearchService>, fail_on: Vec<String>) -> Self {
        let fail_on = fail_on
            .into_iter()
            .map(|p| p.to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { inner, fail_on }
    }

    fn should_fail(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.fail_on.iter().any(|p| query.contains(p.as_str()))
    }
}

impl SearchService for FaultInjectingSearch {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn invoke(&self, query: String) -> BoxFuture<'_, SearchOutcome> {
        Box::pin(async move {
            if self.should_fail(&query) {
                info!(query = %query, "Injected search fault");
                return SearchOutcome::error(format!(
                    "Search service unavailable for query '{}'",
                    query
                ));
            }
            self.inner.invoke(query).await
        })
    }
}
