//! Tab lifecycle notifications.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::EventBus;
use crate::browser::TabId;

/// Loading status reported for a tab.
///
/// Only [`TabStatus::Complete`] and [`TabStatus::Unloaded`] end a session;
/// every other status is carried through and ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    /// The page is still loading.
    Loading,
    /// The page finished loading.
    Complete,
    /// The tab was destroyed or navigated away before loading finished.
    Unloaded,
    /// Any status the engine does not interpret.
    #[serde(untagged)]
    Other(String),
}

impl TabStatus {
    /// Parses a raw status string as reported by the browser.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "loading" => Self::Loading,
            "complete" => Self::Complete,
            "unloaded" => Self::Unloaded,
            other => Self::Other(other.to_string()),
        }
    }

    /// Maps the status to the terminal state it causes, if any.
    #[must_use]
    pub fn terminal(&self) -> Option<TabTerminal> {
        match self {
            Self::Complete => Some(TabTerminal::Loaded),
            Self::Unloaded => Some(TabTerminal::Unloaded),
            Self::Loading | Self::Other(_) => None,
        }
    }
}

impl fmt::Display for TabStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => write!(f, "loading"),
            Self::Complete => write!(f, "complete"),
            Self::Unloaded => write!(f, "unloaded"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// How a tab session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabTerminal {
    /// The tab reached the loaded state.
    Loaded,
    /// The tab went away before loading.
    Unloaded,
}

/// A lifecycle notification for one tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabEvent {
    /// The tab the event refers to.
    pub tab_id: TabId,
    /// The reported status.
    pub status: TabStatus,
}

impl TabEvent {
    /// Creates a new event.
    #[must_use]
    pub fn new(tab_id: TabId, status: TabStatus) -> Self {
        Self { tab_id, status }
    }

    /// Shorthand for a `complete` event.
    #[must_use]
    pub fn complete(tab_id: TabId) -> Self {
        Self::new(tab_id, TabStatus::Complete)
    }

    /// Shorthand for an `unloaded` event.
    #[must_use]
    pub fn unloaded(tab_id: TabId) -> Self {
        Self::new(tab_id, TabStatus::Unloaded)
    }
}

/// The bus tab lifecycle events travel on.
pub type LifecycleBus = EventBus<TabEvent>;
