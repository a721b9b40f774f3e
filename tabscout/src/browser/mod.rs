//! Browser collaborator boundary.
//!
//! This module provides:
//! - Protocol traits for windows, tabs, script injection and messaging
//! - The typed request/response messages exchanged with injected scripts

mod messages;
mod protocols;

pub use messages::{CandidateLink, ContentResponse, LinksResponse, TabRequest};
pub use protocols::{BrowserDriver, ScriptInjector, TabId, TabMessenger, WindowId, WorkSurface};
