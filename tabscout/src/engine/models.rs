//! Data carried through a research task.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::browser::{CandidateLink, ContentResponse};
use crate::errors::InvalidRequestError;
use crate::utils::iso_timestamp;

/// One search to run: which site to search and for what.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// URL identifying the site or engine to search.
    pub target_url: String,
    /// The search keyword.
    pub keyword: String,
}

impl SearchRequest {
    /// Creates a new search request.
    #[must_use]
    pub fn new(target_url: impl Into<String>, keyword: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
            keyword: keyword.into(),
        }
    }

    /// Checks that both fields carry something usable.
    pub fn validate(&self) -> Result<(), InvalidRequestError> {
        if self.keyword.trim().is_empty() {
            return Err(InvalidRequestError::missing("keyword"));
        }
        if self.target_url.trim().is_empty() {
            return Err(InvalidRequestError::missing("target_url"));
        }
        Ok(())
    }
}

/// A result link and, once extracted, its page content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailLink {
    /// Link text from the results page.
    pub title: String,
    /// Link target.
    pub url: String,
    /// Extracted page text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Document title of the visited page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
}

impl DetailLink {
    /// Creates a link with no content yet.
    #[must_use]
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            content: None,
            page_title: None,
        }
    }

    /// Returns true if extraction produced non-empty content.
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.is_empty())
    }
}

impl From<CandidateLink> for DetailLink {
    fn from(link: CandidateLink) -> Self {
        Self::new(link.title, link.url)
    }
}

/// Links discovered by one search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkGroup {
    /// The results page the links came from.
    pub search_url: String,
    /// Script used to scrape both the results page and the linked pages.
    pub script_id: String,
    /// Links in results-page order.
    pub links: Vec<DetailLink>,
}

/// Aggregate report of one research task.
///
/// Counters only ever move by one. `succeed + failed <= total` and
/// `failed_links.len() == failed` hold at every point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchInfo {
    /// Identifier of the task that produced this report.
    pub task_id: Uuid,
    /// Number of links queued for extraction.
    pub total: usize,
    /// Extraction tabs currently open.
    pub running: usize,
    /// Links whose content was extracted.
    pub succeed: usize,
    /// Links whose extraction failed.
    pub failed: usize,
    /// The failed links, in completion order.
    pub failed_links: Vec<DetailLink>,
    /// Discovered link groups, in completion order.
    pub result: Vec<LinkGroup>,
    /// Whether discovery hit its timeout.
    pub discovery_timed_out: bool,
    /// Whether extraction hit its timeout.
    pub extraction_timed_out: bool,
    /// When the task started (ISO 8601).
    pub started_at: String,
    /// When the task finished (ISO 8601).
    pub finished_at: Option<String>,
}

impl SearchInfo {
    /// Creates an empty report for `task_id`.
    #[must_use]
    pub fn new(task_id: Uuid) -> Self {
        Self {
            task_id,
            total: 0,
            running: 0,
            succeed: 0,
            failed: 0,
            failed_links: Vec::new(),
            result: Vec::new(),
            discovery_timed_out: false,
            extraction_timed_out: false,
            started_at: iso_timestamp(),
            finished_at: None,
        }
    }

    /// Checks the counter invariants.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.succeed + self.failed <= self.total && self.failed_links.len() == self.failed
    }

    /// Iterates over every discovered link.
    pub fn links(&self) -> impl Iterator<Item = &DetailLink> {
        self.result.iter().flat_map(|group| group.links.iter())
    }

    /// Iterates over links that ended up with content.
    pub fn links_with_content(&self) -> impl Iterator<Item = &DetailLink> {
        self.links().filter(|link| link.has_content())
    }

    pub(crate) fn link_mut(&mut self, group: usize, index: usize) -> Option<&mut DetailLink> {
        self.result.get_mut(group)?.links.get_mut(index)
    }

    pub(crate) fn mark_running(&mut self) {
        self.running += 1;
    }

    fn release_running(&mut self) {
        self.running = self.running.saturating_sub(1);
    }

    /// Stores extracted content on a link.
    pub(crate) fn record_success(&mut self, group: usize, index: usize, response: ContentResponse) {
        self.release_running();
        if let Some(link) = self.link_mut(group, index) {
            link.content = Some(response.content);
            link.page_title = Some(response.title);
            self.succeed += 1;
        }
    }

    /// Counts a failed link. `was_running` is false when its tab never opened.
    pub(crate) fn record_failure(&mut self, group: usize, index: usize, was_running: bool) {
        if was_running {
            self.release_running();
        }
        let link = self
            .result
            .get(group)
            .and_then(|g| g.links.get(index))
            .cloned();
        if let Some(link) = link {
            self.failed += 1;
            self.failed_links.push(link);
        }
    }

    /// Releases a link whose tab unloaded before loading.
    pub(crate) fn record_loss(&mut self) {
        self.release_running();
    }
}
