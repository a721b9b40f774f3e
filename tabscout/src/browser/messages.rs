//! Requests sent to injected scripts and the replies they produce.

use serde::{Deserialize, Serialize};

/// A request to an injected extraction script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TabRequest {
    /// Scrape candidate result links from a search results page.
    SearchLinks {
        /// The keyword that was searched.
        keyword: String,
    },
    /// Scrape the readable content of a page.
    PageContent,
}

/// A candidate link found on a results page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateLink {
    /// Link text.
    #[serde(default)]
    pub title: String,
    /// Link target.
    pub url: String,
}

/// Reply to [`TabRequest::SearchLinks`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinksResponse {
    /// Links in page order.
    #[serde(default)]
    pub links: Vec<CandidateLink>,
}

impl LinksResponse {
    /// Reads a reply, treating an absent or malformed one as no links.
    #[must_use]
    pub fn from_reply(reply: Option<serde_json::Value>) -> Self {
        reply
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }
}

/// Reply to [`TabRequest::PageContent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentResponse {
    /// The page's document title.
    #[serde(default)]
    pub title: String,
    /// The extracted text.
    pub content: String,
}

impl ContentResponse {
    /// Reads a reply.
    ///
    /// Returns a description of the problem when the reply is absent or does
    /// not have the expected shape.
    pub fn from_reply(reply: Option<serde_json::Value>) -> Result<Self, String> {
        match reply {
            None | Some(serde_json::Value::Null) => Err("no result".to_string()),
            Some(value) => {
                serde_json::from_value(value).map_err(|e| format!("invalid result: {e}"))
            }
        }
    }
}
