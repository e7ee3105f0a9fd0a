use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::json;
use tracing::{debug, warn};

use trellis_core::traits::SearchService;
use trellis_core::types::SearchOutcome;

const TAVILY_API_URL: &str = "https://api.tavily.com/search";

/// Tavily web search. Transport and API failures are folded into
/// error-shaped outcomes; `invoke` never fails.
pub struct TavilySearch {
    api_key: String,
    base_url: String,
    max_results: u32,
    http: reqwest::Client,
}

impl TavilySearch {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: TAVILY_API_URL.to_string(),
            max_results: 5,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        match reqwest::Client::builder().timeout(timeout).build() {
            Ok(http) => self.http = http,
            Err(e) => warn!(error = %e, "Failed to build search HTTP client, keeping default"),
        }
        self
    }

    async fn search(&self, query: &str) -> Result<serde_json::Value, String> {
        let resp = self
            .http
            .post(&self.base_url)
            .json(&json!({
                "api_key": self.api_key,
                "query": query,
                "max_results": self.max_results,
            }))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("HTTP {}: {}", status, body));
        }

        resp.json().await.map_err(|e| e.to_string())
    }
}

/// Render a Tavily response body as result text.
pub(crate) fn format_results(body: &serde_json::Value) -> SearchOutcome {
    if let Some(detail) = body["detail"]["error"].as_str().or(body["error"].as_str()) {
        return SearchOutcome::error(detail.to_string());
    }

    let results = match body["results"].as_array() {
        Some(arr) if !arr.is_empty() => arr,
        _ => return SearchOutcome::success("No results found."),
    };

    let text = results
        .iter()
        .map(|r| {
            format!(
                "**{}**\n{}\nURL: {}",
                r["title"].as_str().unwrap_or(""),
                r["content"].as_str().unwrap_or(""),
                r["url"].as_str().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    SearchOutcome::success(text)
}

impl SearchService for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    fn invoke(&self, query: String) -> BoxFuture<'_, SearchOutcome> {
        Box::pin(async move {
            debug!(query = %query, "Web search");
            match self.search(&query).await {
                Ok(body) => format_results(&body),
                Err(e) => {
                    warn!(query = %query, error = %e, "Web search failed");
                    SearchOutcome::error(format!("search request failed: {}", e))
                }
            }
        })
    }
}
