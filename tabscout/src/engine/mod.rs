//! The two-phase research engine.
//!
//! A task first opens one search results tab per [`SearchRequest`] and
//! scrapes candidate links from each (discovery), then opens one tab per
//! discovered link and scrapes its content (extraction). Each phase fans out
//! every unit at once and waits on a [`CompletionBarrier`](crate::sync::CompletionBarrier)
//! with a fixed deadline. Units learn that their tab finished loading only
//! through lifecycle events published on the engine's bus.

mod context;
mod discovery;
mod extraction;
mod models;
mod session;

#[cfg(test)]
mod engine_tests;

pub use models::{DetailLink, LinkGroup, SearchInfo, SearchRequest};
pub use session::{
    OpeningGuard, Phase, SessionHandle, SessionTable, TabSession, SESSION_TABLE_SUBSCRIBER,
};

use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn, Instrument};

use self::context::TaskContext;
use crate::browser::{BrowserDriver, WindowId};
use crate::config::EngineConfig;
use crate::errors::{InvalidRequestError, ResearchError};
use crate::events::{EventSink, LifecycleBus, NoOpEventSink};
use crate::utils::{elapsed_ms, generate_task_id, iso_timestamp};

/// Drives research tasks against a browser.
///
/// The engine owns the lifecycle bus and the session table. The browser
/// driver publishes every tab status change on [`lifecycle`](Self::lifecycle).
/// Several tasks may run on one engine at once; their sessions are keyed by
/// task id and never observe each other.
pub struct ResearchEngine {
    driver: Arc<dyn BrowserDriver>,
    bus: LifecycleBus,
    sessions: Arc<SessionTable>,
    sink: Arc<dyn EventSink>,
    config: EngineConfig,
}

impl ResearchEngine {
    /// Creates an engine over `driver`.
    #[must_use]
    pub fn new(driver: Arc<dyn BrowserDriver>, config: EngineConfig) -> Self {
        let bus = LifecycleBus::new();
        let sessions = Arc::new(SessionTable::new());
        sessions.attach(&bus);
        Self {
            driver,
            bus,
            sessions,
            sink: Arc::new(NoOpEventSink),
            config,
        }
    }

    /// Sets the sink that receives task progress events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The bus the browser driver publishes tab lifecycle events on.
    #[must_use]
    pub fn lifecycle(&self) -> LifecycleBus {
        self.bus.clone()
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of tab sessions still waiting for a terminal event.
    #[must_use]
    pub fn pending_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Runs one research task.
    ///
    /// Keeps at most `details_max_num` links per search. When `window` is
    /// given the task's tabs open there and the window is left alone;
    /// otherwise a window is created for the task and removed afterwards.
    ///
    /// Only invalid input or failing to create the window is an error. Failed
    /// searches, failed links and timeouts are reflected in the returned
    /// [`SearchInfo`].
    pub async fn run(
        &self,
        requests: &[SearchRequest],
        details_max_num: usize,
        window: Option<WindowId>,
    ) -> Result<SearchInfo, ResearchError> {
        if requests.is_empty() {
            return Err(InvalidRequestError::new("requests", "at least one search request is required").into());
        }
        for request in requests {
            request.validate()?;
        }

        let task_id = generate_task_id();
        let span = tracing::info_span!("research", %task_id);
        self.run_task(task_id, requests, details_max_num, window)
            .instrument(span)
            .await
    }

    async fn run_task(
        &self,
        task_id: uuid::Uuid,
        requests: &[SearchRequest],
        details_max_num: usize,
        window: Option<WindowId>,
    ) -> Result<SearchInfo, ResearchError> {
        let start = Instant::now();
        let (window_id, owns_window) = match window {
            Some(window_id) => (window_id, false),
            None => (self.driver.create_window().await?, true),
        };

        info!(
            requests = requests.len(),
            details_max_num,
            window_id,
            owns_window,
            "Research task started"
        );
        self.sink.try_emit(
            "research.started",
            Some(json!({
                "task_id": task_id.to_string(),
                "requests": requests.len(),
                "details_max_num": details_max_num,
            })),
        );

        let ctx = Arc::new(TaskContext::new(
            task_id,
            window_id,
            details_max_num,
            self.driver.clone(),
            self.bus.clone(),
            self.sessions.clone(),
            self.sink.clone(),
            self.config.clone(),
        ));

        let mut info = SearchInfo::new(task_id);

        let (groups, discovery) = discovery::run(&ctx, requests).await;
        info.discovery_timed_out = discovery.is_timed_out();
        info.result = groups;
        self.sink.try_emit(
            "discovery.completed",
            Some(json!({
                "task_id": task_id.to_string(),
                "groups": info.result.len(),
                "links": info.links().count(),
                "timed_out": info.discovery_timed_out,
            })),
        );

        let (mut info, _) = extraction::run(&ctx, info).await;
        self.sink.try_emit(
            "extraction.completed",
            Some(json!({
                "task_id": task_id.to_string(),
                "total": info.total,
                "succeed": info.succeed,
                "failed": info.failed,
                "running": info.running,
                "timed_out": info.extraction_timed_out,
            })),
        );

        if owns_window {
            if let Err(e) = self.driver.remove_window(window_id).await {
                warn!(window_id, error = %e, "Failed to remove task window");
            }
        }

        info.finished_at = Some(iso_timestamp());
        let duration_ms = elapsed_ms(start);
        info!(
            succeed = info.succeed,
            failed = info.failed,
            total = info.total,
            duration_ms,
            "Research task finished"
        );
        self.sink.try_emit(
            "research.completed",
            Some(json!({
                "task_id": task_id.to_string(),
                "duration_ms": duration_ms,
            })),
        );

        Ok(info)
    }

    /// Tears down every pending session of every task.
    ///
    /// Their tabs are closed and their subscriptions removed; waiters stop
    /// without touching their task's report.
    pub async fn shutdown(&self) -> usize {
        let stale = self.sessions.sweep_all(&self.bus);
        for session in &stale {
            if let Err(e) = self.driver.remove_tab(session.tab_id).await {
                warn!(tab_id = session.tab_id, error = %e, "Failed to close tab during shutdown");
            }
        }
        self.bus.clear();
        self.sessions.attach(&self.bus);
        stale.len()
    }
}

impl std::fmt::Debug for ResearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchEngine")
            .field("pending_sessions", &self.pending_sessions())
            .field("subscribers", &self.bus.len())
            .field("config", &self.config)
            .finish()
    }
}
