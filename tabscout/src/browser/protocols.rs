//! Protocol traits for the browser collaborators.
//!
//! The engine never talks to a browser directly. It opens windows and tabs
//! through [`WorkSurface`], injects extraction scripts through
//! [`ScriptInjector`], and asks those scripts for data through
//! [`TabMessenger`]. Lifecycle notifications flow the other way: the driver
//! publishes them on the engine's lifecycle bus.

use async_trait::async_trait;

use super::messages::TabRequest;
use crate::errors::DriverError;

/// Identifier of a browser tab.
pub type TabId = u64;

/// Identifier of a top-level browser window.
pub type WindowId = u64;

/// Creates and removes browsing surfaces.
#[async_trait]
pub trait WorkSurface: Send + Sync {
    /// Creates a top-level window to hold a task's tabs.
    async fn create_window(&self) -> Result<WindowId, DriverError>;

    /// Removes a window created by [`create_window`](Self::create_window).
    async fn remove_window(&self, window_id: WindowId) -> Result<(), DriverError>;

    /// Opens a tab at `url` inside `window_id`.
    ///
    /// The tab starts loading immediately; its progress is reported through
    /// lifecycle events, not through this call.
    async fn create_tab(&self, window_id: WindowId, url: &str) -> Result<TabId, DriverError>;

    /// Closes a tab.
    async fn remove_tab(&self, tab_id: TabId) -> Result<(), DriverError>;
}

/// Injects named extraction scripts into tabs.
#[async_trait]
pub trait ScriptInjector: Send + Sync {
    /// Injects `script_id` into the tab's execution context.
    ///
    /// Only called once the tab is confirmed loaded.
    async fn inject(&self, tab_id: TabId, script_id: &str) -> Result<(), DriverError>;
}

/// One-shot request/response channel to an injected script.
#[async_trait]
pub trait TabMessenger: Send + Sync {
    /// Sends `request` to the tab and waits for its single reply.
    ///
    /// `Ok(None)` means the script answered with nothing.
    async fn send(
        &self,
        tab_id: TabId,
        request: &TabRequest,
    ) -> Result<Option<serde_json::Value>, DriverError>;
}

/// Everything the engine needs from a browser.
pub trait BrowserDriver: WorkSurface + ScriptInjector + TabMessenger {}

impl<T> BrowserDriver for T where T: WorkSurface + ScriptInjector + TabMessenger {}
