//! Per-task context shared by every work unit.

use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::session::{Phase, SessionHandle, SessionTable, TabSession};
use crate::browser::{BrowserDriver, TabId, WindowId};
use crate::config::EngineConfig;
use crate::errors::DriverError;
use crate::events::{EventSink, LifecycleBus};

/// Shared state of one phase that can be sealed.
///
/// Once sealed, [`apply`](Self::apply) refuses further mutation, so work
/// finishing after the phase's deadline cannot change the report.
#[derive(Debug)]
pub(crate) struct PhaseState<T> {
    value: T,
    sealed: bool,
}

impl<T: Clone> PhaseState<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            value,
            sealed: false,
        }
    }

    /// Runs `mutate` unless the phase is sealed.
    pub(crate) fn apply<R>(&mut self, mutate: impl FnOnce(&mut T) -> R) -> Option<R> {
        if self.sealed {
            None
        } else {
            Some(mutate(&mut self.value))
        }
    }

    /// Seals the state and returns its final value.
    pub(crate) fn seal(&mut self) -> T {
        self.sealed = true;
        self.value.clone()
    }
}

/// Everything a work unit needs to drive its tab.
pub(crate) struct TaskContext {
    pub(crate) task_id: Uuid,
    pub(crate) window_id: WindowId,
    pub(crate) details_max_num: usize,
    pub(crate) driver: Arc<dyn BrowserDriver>,
    pub(crate) bus: LifecycleBus,
    pub(crate) sessions: Arc<SessionTable>,
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) config: EngineConfig,
    discovery_closed: AtomicBool,
    extraction_closed: AtomicBool,
}

impl TaskContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        task_id: Uuid,
        window_id: WindowId,
        details_max_num: usize,
        driver: Arc<dyn BrowserDriver>,
        bus: LifecycleBus,
        sessions: Arc<SessionTable>,
        sink: Arc<dyn EventSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            task_id,
            window_id,
            details_max_num,
            driver,
            bus,
            sessions,
            sink,
            config,
            discovery_closed: AtomicBool::new(false),
            extraction_closed: AtomicBool::new(false),
        }
    }

    fn closed_flag(&self, phase: Phase) -> &AtomicBool {
        match phase {
            Phase::Discovery => &self.discovery_closed,
            Phase::Extraction => &self.extraction_closed,
        }
    }

    /// Returns true once `phase` has been swept.
    pub(crate) fn is_closed(&self, phase: Phase) -> bool {
        self.closed_flag(phase).load(Ordering::SeqCst)
    }

    /// Opens a tab at `url` and binds it to a session.
    ///
    /// Returns `Ok(None)` when the phase was swept while the tab was opening;
    /// the tab is closed and nothing is registered.
    pub(crate) async fn open_tab(
        &self,
        phase: Phase,
        unit: &str,
        url: &str,
    ) -> Result<Option<SessionHandle>, DriverError> {
        let _opening = self.sessions.begin_open();
        let tab_id = self.driver.create_tab(self.window_id, url).await?;

        if let Some(session) = self.open_session(phase, unit, tab_id) {
            return Ok(Some(session));
        }
        debug!(task_id = %self.task_id, tab_id, %phase, url, "Tab opened after its phase closed");
        self.close_tab(tab_id).await;
        Ok(None)
    }

    /// Registers a session for a freshly opened tab, unless the phase is closed.
    fn open_session(&self, phase: Phase, unit: &str, tab_id: TabId) -> Option<SessionHandle> {
        if self.is_closed(phase) {
            return None;
        }
        let session = TabSession::new(self.task_id, phase, unit, tab_id);
        let handle = self.sessions.open(&self.bus, session);

        // The sweep may have run between the check and the insert. Whoever
        // removes the session owns closing its tab.
        if self.is_closed(phase) && self.sessions.cancel(&self.bus, handle.event_id()) {
            return None;
        }
        Some(handle)
    }

    /// Closes a tab, logging failures.
    pub(crate) async fn close_tab(&self, tab_id: TabId) {
        if let Err(e) = self.driver.remove_tab(tab_id).await {
            debug!(task_id = %self.task_id, tab_id, error = %e, "Failed to close tab");
        }
    }

    /// Closes `phase` and tears down its sessions that never reached a
    /// terminal state. Tabs that finish opening afterwards are closed by
    /// [`open_tab`](Self::open_tab).
    pub(crate) async fn sweep(&self, phase: Phase) -> usize {
        self.closed_flag(phase).store(true, Ordering::SeqCst);
        let stale = self.sessions.sweep(&self.bus, self.task_id, phase);
        if stale.is_empty() {
            return 0;
        }

        warn!(
            task_id = %self.task_id,
            %phase,
            count = stale.len(),
            "Phase timed out; closing tabs that never finished loading"
        );
        join_all(stale.iter().map(|s| self.close_tab(s.tab_id))).await;
        stale.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoOpEventSink;
    use crate::testing::{PageScript, ScriptedBrowser};

    fn context_over(browser: &Arc<ScriptedBrowser>) -> TaskContext {
        let bus = LifecycleBus::new();
        let sessions = Arc::new(SessionTable::new());
        sessions.attach(&bus);
        browser.attach(bus.clone());
        TaskContext::new(
            Uuid::new_v4(),
            1,
            5,
            browser.clone(),
            bus,
            sessions,
            Arc::new(NoOpEventSink),
            EngineConfig::default(),
        )
    }

    #[test]
    fn test_phase_state_seal_blocks_apply() {
        let mut state = PhaseState::new(Vec::<u32>::new());
        assert_eq!(state.apply(|v| v.push(1)), Some(()));

        let sealed = state.seal();
        assert_eq!(sealed, vec![1]);

        assert_eq!(state.apply(|v| v.push(2)), None);
        assert_eq!(state.seal(), vec![1]);
    }

    #[tokio::test]
    async fn test_tab_opened_after_sweep_is_closed() {
        let browser = Arc::new(ScriptedBrowser::new().with_fallback(PageScript::Hangs));
        let ctx = context_over(&browser);

        assert_eq!(ctx.sweep(Phase::Discovery).await, 0);
        assert!(ctx.is_closed(Phase::Discovery));

        let opened = ctx.open_tab(Phase::Discovery, "0", "https://late").await.unwrap();
        assert!(opened.is_none());
        assert!(ctx.sessions.is_empty());
        assert!(browser.open_tabs().is_empty());
        assert_eq!(ctx.bus.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_closes_only_its_phase() {
        let browser = Arc::new(ScriptedBrowser::new().with_fallback(PageScript::Hangs));
        let ctx = context_over(&browser);

        let discovery = ctx.open_tab(Phase::Discovery, "0", "https://a").await.unwrap();
        let extraction = ctx.open_tab(Phase::Extraction, "0:0", "https://b").await.unwrap();
        assert!(discovery.is_some() && extraction.is_some());

        assert_eq!(ctx.sweep(Phase::Discovery).await, 1);
        assert!(!ctx.is_closed(Phase::Extraction));
        assert_eq!(ctx.sessions.len(), 1);
        assert_eq!(browser.open_tabs().len(), 1);
    }
}
