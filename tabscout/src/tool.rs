//! The web research tool: one request in, a list of page extracts out.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::ToolConfig;
use crate::engine::{ResearchEngine, SearchInfo, SearchRequest};
use crate::errors::{InvalidRequestError, ResearchError};

/// Name the tool is registered under.
pub const TOOL_NAME: &str = "web_research";

/// A tool call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebResearchRequest {
    /// Keyword to search for.
    #[serde(default)]
    pub query: String,
    /// Links to visit per search.
    #[serde(
        default,
        rename = "maxResults",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_results: Option<usize>,
    /// Site to search; picks the search adapter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl WebResearchRequest {
    /// Creates a request for `query` with default site and limit.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Sets the number of links to visit.
    #[must_use]
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Sets the site to search.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// One extracted page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchHit {
    /// Page title, or the search result title when the page had none.
    pub title: String,
    /// Page URL.
    pub url: String,
    /// Extracted text.
    pub content: String,
}

/// Adapts [`ResearchEngine`] to a tool-call interface.
#[derive(Debug, Clone)]
pub struct WebResearchTool {
    engine: Arc<ResearchEngine>,
    config: ToolConfig,
}

impl WebResearchTool {
    /// Creates a tool over `engine`.
    #[must_use]
    pub fn new(engine: Arc<ResearchEngine>, config: ToolConfig) -> Self {
        Self { engine, config }
    }

    /// JSON Schema of the tool's input.
    #[must_use]
    pub fn input_schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Keyword to search for"},
                "maxResults": {"type": "integer", "minimum": 1},
                "url": {"type": "string", "description": "Site to search"}
            },
            "required": ["query"]
        })
    }

    /// Handles a raw tool call.
    pub async fn call(&self, arguments: serde_json::Value) -> Result<Vec<ResearchHit>, ResearchError> {
        let request: WebResearchRequest = serde_json::from_value(arguments)
            .map_err(|e| InvalidRequestError::new("arguments", e.to_string()))?;
        self.research(&request).await
    }

    /// Runs one research task and returns the pages that yielded content.
    pub async fn research(&self, request: &WebResearchRequest) -> Result<Vec<ResearchHit>, ResearchError> {
        if request.query.trim().is_empty() {
            return Err(InvalidRequestError::missing("query").into());
        }
        let max_results = request.max_results.unwrap_or(self.config.default_max_results);
        if max_results == 0 {
            return Err(InvalidRequestError::new("maxResults", "must be at least 1").into());
        }
        let url = request
            .url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(self.config.default_url.as_str());

        debug!(query = %request.query, url, max_results, "Web research requested");
        let search = SearchRequest::new(url, request.query.clone());
        let info = self.engine.run(&[search], max_results, None).await?;

        let hits = collect_hits(&info);
        info!(
            task_id = %info.task_id,
            hits = hits.len(),
            failed = info.failed,
            "Web research finished"
        );
        Ok(hits)
    }
}

fn collect_hits(info: &SearchInfo) -> Vec<ResearchHit> {
    info.links_with_content()
        .map(|link| ResearchHit {
            title: link
                .page_title
                .clone()
                .filter(|title| !title.is_empty())
                .unwrap_or_else(|| link.title.clone()),
            url: link.url.clone(),
            content: link.content.clone().unwrap_or_default(),
        })
        .collect()
}
