use std::sync::Arc;
use std::time::Duration;

use trellis_core::config::SearchConfig;
use trellis_core::error::{Result, TrellisError};
use trellis_core::traits::SearchService;

use crate::builtin::{FaultInjectingSearch, TavilySearch};

/// Build the search backend described by `config`, with fault injection
/// layered on top when `fail_on` is non-empty.
pub fn create_search(config: &SearchConfig) -> Result<Arc<dyn SearchService>> {
    let backend: Arc<dyn SearchService> = match config.provider.as_str() {
        "tavily" => {
            let api_key = config
                .api_key
                .as_deref()
                .ok_or_else(|| TrellisError::Config("search.api_key is required for tavily".into()))?;
            let mut search = TavilySearch::new(api_key)
                .with_max_results(config.max_results)
                .with_timeout(Duration::from_secs(config.timeout_secs));
            if let Some(url) = &config.base_url {
                search = search.with_base_url(url.clone());
            }
            Arc::new(search)
        }
        other => return Err(TrellisError::UnsupportedProvider(format!("search: {}", other))),
    };

    if config.fail_on.is_empty() {
        Ok(backend)
    } else {
        Ok(Arc::new(FaultInjectingSearch::new(
            backend,
            config.fail_on.clone(),
        )))
    }
}
