//! Error types for tabscout.
//!
//! Only structurally invalid requests and a missing work surface surface as
//! hard failures. Everything that goes wrong inside a single tab is a
//! [`DriverError`] that the engine logs and classifies instead of returning.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for research operations.
#[derive(Debug, Error)]
pub enum ResearchError {
    /// The request was malformed.
    #[error("{0}")]
    InvalidRequest(#[from] InvalidRequestError),

    /// A browser collaborator failed in a way that prevents the task from running.
    #[error("{0}")]
    Driver(#[from] DriverError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ResearchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Raised when a research request is missing a required field or carries an
/// unusable value.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[error("Invalid request: {field} - {reason}")]
pub struct InvalidRequestError {
    /// The offending field.
    pub field: String,
    /// Why it was rejected.
    pub reason: String,
}

impl InvalidRequestError {
    /// Creates a new invalid request error.
    #[must_use]
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an error for a required field that was absent or empty.
    #[must_use]
    pub fn missing(field: impl Into<String>) -> Self {
        Self::new(field, "field is required")
    }
}

/// Failures reported by the browser collaborators.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
    /// The work surface (window) could not be created or removed.
    #[error("Work surface error: {reason}")]
    WorkSurface {
        /// The reason for failure.
        reason: String,
    },

    /// A tab could not be opened.
    #[error("Failed to open tab for {url}: {reason}")]
    TabOpen {
        /// The URL the tab was opened at.
        url: String,
        /// The reason for failure.
        reason: String,
    },

    /// A tab could not be closed.
    #[error("Failed to close tab {tab_id}: {reason}")]
    TabClose {
        /// The tab identifier.
        tab_id: u64,
        /// The reason for failure.
        reason: String,
    },

    /// The extraction script could not be injected.
    #[error("Failed to inject '{script_id}' into tab {tab_id}: {reason}")]
    Injection {
        /// The tab identifier.
        tab_id: u64,
        /// The script that was being injected.
        script_id: String,
        /// The reason for failure.
        reason: String,
    },

    /// The one-shot request to the injected script failed.
    #[error("Messaging tab {tab_id} failed: {reason}")]
    Messaging {
        /// The tab identifier.
        tab_id: u64,
        /// The reason for failure.
        reason: String,
    },
}

impl DriverError {
    /// Creates a work surface error.
    #[must_use]
    pub fn work_surface(reason: impl Into<String>) -> Self {
        Self::WorkSurface {
            reason: reason.into(),
        }
    }

    /// Creates a tab open error.
    #[must_use]
    pub fn tab_open(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TabOpen {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an injection error.
    #[must_use]
    pub fn injection(tab_id: u64, script_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Injection {
            tab_id,
            script_id: script_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a messaging error.
    #[must_use]
    pub fn messaging(tab_id: u64, reason: impl Into<String>) -> Self {
        Self::Messaging {
            tab_id,
            reason: reason.into(),
        }
    }

    /// Short machine-readable kind, carried in `extraction.link_failed`
    /// payloads and log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::WorkSurface { .. } => "work_surface",
            Self::TabOpen { .. } => "tab_open",
            Self::TabClose { .. } => "tab_close",
            Self::Injection { .. } => "injection",
            Self::Messaging { .. } => "messaging",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_request_message() {
        let err = InvalidRequestError::missing("query");
        assert_eq!(err.to_string(), "Invalid request: query - field is required");
    }

    #[test]
    fn test_research_error_from_invalid_request() {
        let err: ResearchError = InvalidRequestError::new("maxResults", "must be at least 1").into();
        assert!(matches!(err, ResearchError::InvalidRequest(_)));
        assert!(err.to_string().contains("maxResults"));
    }

    #[test]
    fn test_driver_error_kinds() {
        assert_eq!(DriverError::injection(7, "google", "tab crashed").kind(), "injection");
        assert_eq!(DriverError::tab_open("https://example.org", "refused").kind(), "tab_open");
        assert_eq!(DriverError::messaging(7, "port closed").kind(), "messaging");
        assert_eq!(DriverError::work_surface("no display").kind(), "work_surface");
    }

    #[test]
    fn test_driver_error_messages() {
        let err = DriverError::injection(7, "google", "tab crashed");
        assert_eq!(err.to_string(), "Failed to inject 'google' into tab 7: tab crashed");
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: ResearchError = parse.unwrap_err().into();
        assert!(matches!(err, ResearchError::Serialization(_)));
    }
}
