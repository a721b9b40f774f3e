//! An in-process browser driven by per-URL scripts.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::warn;

use crate::browser::{ScriptInjector, TabId, TabMessenger, TabRequest, WindowId, WorkSurface};
use crate::errors::DriverError;
use crate::events::{LifecycleBus, TabEvent, TabStatus};

/// How a page behaves once a tab is opened at its URL.
#[derive(Debug, Clone, PartialEq)]
pub enum PageScript {
    /// The tab loads and the injected script answers with `reply` after
    /// `reply_delay`.
    Loads {
        /// What the script answers; `None` models a script that stays silent.
        reply: Option<serde_json::Value>,
        /// Delay before the answer.
        reply_delay: Duration,
    },
    /// The tab is destroyed before it finishes loading.
    Unloads,
    /// The tab starts loading and never reaches a terminal state.
    Hangs,
    /// Opening the tab fails.
    FailsToOpen,
    /// The tab loads but script injection fails.
    FailsInjection,
    /// The tab loads but messaging the script fails.
    FailsMessaging,
}

impl PageScript {
    /// A page that loads and answers immediately.
    #[must_use]
    pub fn replies(reply: serde_json::Value) -> Self {
        Self::Loads {
            reply: Some(reply),
            reply_delay: Duration::ZERO,
        }
    }

    /// A page that loads and answers after `delay`.
    #[must_use]
    pub fn replies_after(reply: serde_json::Value, delay: Duration) -> Self {
        Self::Loads {
            reply: Some(reply),
            reply_delay: delay,
        }
    }

    /// A page that loads but whose script answers with nothing.
    #[must_use]
    pub fn silent() -> Self {
        Self::Loads {
            reply: None,
            reply_delay: Duration::ZERO,
        }
    }

    fn loads(&self) -> bool {
        matches!(
            self,
            Self::Loads { .. } | Self::FailsInjection | Self::FailsMessaging
        )
    }
}

/// Builds a discovery reply with `count` links under `base_url`.
#[must_use]
pub fn links_reply(base_url: &str, count: usize) -> serde_json::Value {
    let links: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            serde_json::json!({
                "title": format!("Result {i}"),
                "url": format!("{base_url}/{i}"),
            })
        })
        .collect();
    serde_json::json!({ "links": links })
}

/// Builds an extraction reply.
#[must_use]
pub fn content_reply(title: &str, content: &str) -> serde_json::Value {
    serde_json::json!({ "title": title, "content": content })
}

/// A browser that follows [`PageScript`]s and publishes lifecycle events on
/// the bus it is attached to.
#[derive(Debug)]
pub struct ScriptedBrowser {
    pages: HashMap<String, PageScript>,
    fallback: PageScript,
    load_delay: Duration,
    open_delay: Duration,
    eager_lifecycle: bool,
    fail_window: bool,
    bus: RwLock<Option<LifecycleBus>>,
    next_id: AtomicU64,
    tab_urls: Mutex<HashMap<TabId, String>>,
    opened: Mutex<Vec<(TabId, String)>>,
    closed: Mutex<Vec<TabId>>,
    windows_created: Mutex<Vec<WindowId>>,
    windows_removed: Mutex<Vec<WindowId>>,
    injections: Mutex<Vec<(TabId, String)>>,
    requests: Mutex<Vec<(TabId, TabRequest)>>,
}

impl Default for ScriptedBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBrowser {
    /// Creates a browser where every page hangs unless scripted otherwise.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            fallback: PageScript::Hangs,
            load_delay: Duration::from_millis(1),
            open_delay: Duration::ZERO,
            eager_lifecycle: false,
            fail_window: false,
            bus: RwLock::new(None),
            next_id: AtomicU64::new(1),
            tab_urls: Mutex::new(HashMap::new()),
            opened: Mutex::new(Vec::new()),
            closed: Mutex::new(Vec::new()),
            windows_created: Mutex::new(Vec::new()),
            windows_removed: Mutex::new(Vec::new()),
            injections: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Scripts the page at `url`.
    #[must_use]
    pub fn with_page(mut self, url: impl Into<String>, script: PageScript) -> Self {
        self.pages.insert(url.into(), script);
        self
    }

    /// Scripts every page without its own entry.
    #[must_use]
    pub fn with_fallback(mut self, script: PageScript) -> Self {
        self.fallback = script;
        self
    }

    /// Sets how long tabs take to reach their terminal state.
    #[must_use]
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    /// Sets how long `create_tab` takes to return.
    #[must_use]
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Publishes each tab's lifecycle events from inside `create_tab`,
    /// before its id is returned.
    #[must_use]
    pub fn with_eager_lifecycle(mut self) -> Self {
        self.eager_lifecycle = true;
        self
    }

    /// Makes window creation fail.
    #[must_use]
    pub fn failing_windows(mut self) -> Self {
        self.fail_window = true;
        self
    }

    /// Connects the browser to the bus lifecycle events go to.
    pub fn attach(&self, bus: LifecycleBus) {
        *self.bus.write() = Some(bus);
    }

    fn script_for(&self, url: &str) -> &PageScript {
        self.pages.get(url).unwrap_or(&self.fallback)
    }

    fn script_for_tab(&self, tab_id: TabId) -> PageScript {
        self.tab_urls
            .lock()
            .get(&tab_id)
            .map_or(PageScript::Hangs, |url| self.script_for(url).clone())
    }

    fn emit_lifecycle(&self, tab_id: TabId, script: &PageScript) {
        let Some(bus) = self.bus.read().clone() else {
            warn!(tab_id, "Scripted browser is not attached to a lifecycle bus");
            return;
        };

        let mut statuses = vec![TabStatus::Loading];
        if script.loads() {
            // Browsers report `complete` more than once for some pages.
            statuses.push(TabStatus::Complete);
            statuses.push(TabStatus::Complete);
        } else if *script == PageScript::Unloads {
            statuses.push(TabStatus::Unloaded);
        }

        if self.eager_lifecycle {
            for status in statuses {
                bus.publish(&TabEvent::new(tab_id, status));
            }
            return;
        }

        let delay = self.load_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            for status in statuses {
                bus.publish(&TabEvent::new(tab_id, status));
            }
        });
    }

    /// URLs tabs were opened at, in order.
    #[must_use]
    pub fn opened_urls(&self) -> Vec<String> {
        self.opened.lock().iter().map(|(_, url)| url.clone()).collect()
    }

    /// Tabs that were closed, in order.
    #[must_use]
    pub fn closed_tabs(&self) -> Vec<TabId> {
        self.closed.lock().clone()
    }

    /// Tabs opened and not yet closed.
    #[must_use]
    pub fn open_tabs(&self) -> Vec<TabId> {
        let closed = self.closed.lock();
        self.opened
            .lock()
            .iter()
            .map(|(id, _)| *id)
            .filter(|id| !closed.contains(id))
            .collect()
    }

    /// Tab id opened at `url`, if any.
    #[must_use]
    pub fn tab_for(&self, url: &str) -> Option<TabId> {
        self.opened
            .lock()
            .iter()
            .find(|(_, u)| u == url)
            .map(|(id, _)| *id)
    }

    /// Windows created so far.
    #[must_use]
    pub fn windows_created(&self) -> Vec<WindowId> {
        self.windows_created.lock().clone()
    }

    /// Windows removed so far.
    #[must_use]
    pub fn windows_removed(&self) -> Vec<WindowId> {
        self.windows_removed.lock().clone()
    }

    /// Scripts injected, as `(tab, script_id)`.
    #[must_use]
    pub fn injections(&self) -> Vec<(TabId, String)> {
        self.injections.lock().clone()
    }

    /// Requests sent to injected scripts.
    #[must_use]
    pub fn requests(&self) -> Vec<(TabId, TabRequest)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl WorkSurface for ScriptedBrowser {
    async fn create_window(&self) -> Result<WindowId, DriverError> {
        if self.fail_window {
            return Err(DriverError::work_surface("window creation disabled"));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.windows_created.lock().push(id);
        Ok(id)
    }

    async fn remove_window(&self, window_id: WindowId) -> Result<(), DriverError> {
        self.windows_removed.lock().push(window_id);
        Ok(())
    }

    async fn create_tab(&self, _window_id: WindowId, url: &str) -> Result<TabId, DriverError> {
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        let script = self.script_for(url).clone();
        if script == PageScript::FailsToOpen {
            return Err(DriverError::tab_open(url, "scripted failure"));
        }

        let tab_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.tab_urls.lock().insert(tab_id, url.to_string());
        self.opened.lock().push((tab_id, url.to_string()));
        self.emit_lifecycle(tab_id, &script);
        Ok(tab_id)
    }

    async fn remove_tab(&self, tab_id: TabId) -> Result<(), DriverError> {
        self.closed.lock().push(tab_id);
        Ok(())
    }
}

#[async_trait]
impl ScriptInjector for ScriptedBrowser {
    async fn inject(&self, tab_id: TabId, script_id: &str) -> Result<(), DriverError> {
        self.injections.lock().push((tab_id, script_id.to_string()));
        if self.script_for_tab(tab_id) == PageScript::FailsInjection {
            return Err(DriverError::injection(tab_id, script_id, "scripted failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl TabMessenger for ScriptedBrowser {
    async fn send(
        &self,
        tab_id: TabId,
        request: &TabRequest,
    ) -> Result<Option<serde_json::Value>, DriverError> {
        self.requests.lock().push((tab_id, request.clone()));
        match self.script_for_tab(tab_id) {
            PageScript::Loads { reply, reply_delay } => {
                if !reply_delay.is_zero() {
                    tokio::time::sleep(reply_delay).await;
                }
                Ok(reply)
            }
            PageScript::FailsMessaging => Err(DriverError::messaging(tab_id, "scripted failure")),
            _ => Ok(None),
        }
    }
}
