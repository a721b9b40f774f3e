//! # Tabscout
//!
//! Web research by driving browser tabs.
//!
//! A research task runs in two phases against a browser the caller drives:
//!
//! - **Link discovery**: for each search request, open a search results tab
//!   chosen by the site adapter for the target URL, inject the adapter's
//!   script and collect candidate links
//! - **Content extraction**: open a tab per collected link and scrape its
//!   text
//!
//! Both phases fan out every unit at once. Tabs report progress only through
//! lifecycle events the browser publishes on the engine's event bus, and each
//! phase waits on a countdown barrier with a fixed deadline. Whatever finished
//! by the deadline is what the task reports.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tabscout::prelude::*;
//!
//! let engine = Arc::new(ResearchEngine::new(driver, EngineConfig::default()));
//! // The driver publishes every tab status change here.
//! let lifecycle = engine.lifecycle();
//!
//! let tool = WebResearchTool::new(engine, ToolConfig::default());
//! let hits = tool.research(&WebResearchRequest::new("rust async")).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod adapters;
pub mod browser;
pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod observability;
pub mod sync;
pub mod testing;
pub mod tool;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapters::{resolve, SearchEngine, SiteAdapter};
    pub use crate::browser::{
        BrowserDriver, ScriptInjector, TabId, TabMessenger, TabRequest, WindowId, WorkSurface,
    };
    pub use crate::config::{EngineConfig, ResearchConfig, ToolConfig};
    pub use crate::engine::{DetailLink, LinkGroup, ResearchEngine, SearchInfo, SearchRequest};
    pub use crate::errors::{DriverError, InvalidRequestError, ResearchError};
    pub use crate::events::{
        EventBus, EventSink, LifecycleBus, LoggingEventSink, NoOpEventSink, TabEvent, TabStatus,
    };
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::sync::{BarrierWait, CompletionBarrier};
    pub use crate::tool::{ResearchHit, WebResearchRequest, WebResearchTool};
}
