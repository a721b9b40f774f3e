//! Tab sessions: correlating lifecycle events with work units.
//!
//! Each open tab gets a record in the [`SessionTable`], keyed by a stable
//! event id, and one bus subscription under the same id. The subscription
//! removes the record when the tab reaches a terminal state; because removal
//! succeeds at most once, every session fires at most once no matter how many
//! lifecycle events the browser sends.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

use crate::browser::TabId;
use crate::events::{LifecycleBus, TabEvent, TabTerminal};

/// The crawl phase a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Scraping result links from search pages.
    Discovery,
    /// Scraping content from the discovered links.
    Extraction,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discovery => write!(f, "discovery"),
            Self::Extraction => write!(f, "extraction"),
        }
    }
}

/// One opened tab bound to one work unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabSession {
    /// The task that opened the tab.
    pub task_id: Uuid,
    /// The browser tab.
    pub tab_id: TabId,
    /// Subscription and table key.
    pub event_id: String,
    /// Phase the work unit belongs to.
    pub phase: Phase,
}

impl TabSession {
    /// Creates a session with an id derived from the task, phase and unit.
    #[must_use]
    pub fn new(task_id: Uuid, phase: Phase, unit: &str, tab_id: TabId) -> Self {
        Self {
            task_id,
            tab_id,
            event_id: format!("{task_id}:{phase}:{unit}"),
            phase,
        }
    }
}

struct PendingSession {
    session: TabSession,
    fire: oneshot::Sender<TabTerminal>,
}

/// What the table knows about a tab id.
#[derive(Debug, Clone)]
enum TabSlot {
    /// A terminal event arrived before any session claimed the tab.
    Early(TabTerminal, Instant),
    /// A pending session owns the tab.
    Claimed(String),
}

/// Subscription id of the table's own lifecycle recorder.
pub const SESSION_TABLE_SUBSCRIBER: &str = "tabscout:session-table";

/// How long an unclaimed terminal event is kept.
const EARLY_EVENT_TTL: Duration = Duration::from_secs(60);

/// Table of sessions still waiting for a terminal lifecycle event.
///
/// A tab may reach its terminal state before `create_tab` even returns. While
/// an [`OpeningGuard`] is alive the table records such events per tab, and
/// [`open`](Self::open) consumes them when the session claims the tab.
#[derive(Default)]
pub struct SessionTable {
    pending: DashMap<String, PendingSession>,
    slots: DashMap<TabId, TabSlot>,
    opening: AtomicUsize,
}

impl SessionTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes the table's recorder on `bus`.
    ///
    /// The recorder fires sessions by tab id and keeps terminal events for
    /// tabs that no session has claimed yet.
    pub fn attach(self: &Arc<Self>, bus: &LifecycleBus) {
        let table = Arc::clone(self);
        bus.subscribe(SESSION_TABLE_SUBSCRIBER, move |event: &TabEvent| {
            table.record(event);
            Ok(())
        });
    }

    /// Marks a tab open as in flight until the guard drops.
    pub fn begin_open(&self) -> OpeningGuard<'_> {
        self.opening.fetch_add(1, Ordering::SeqCst);
        OpeningGuard { table: self }
    }

    fn record(&self, event: &TabEvent) {
        let Some(state) = event.status.terminal() else {
            return;
        };
        let claimed = match self.slots.entry(event.tab_id) {
            Entry::Occupied(slot) => match slot.get() {
                TabSlot::Claimed(event_id) => Some(event_id.clone()),
                TabSlot::Early(..) => None,
            },
            Entry::Vacant(slot) => {
                if self.opening.load(Ordering::SeqCst) > 0 {
                    debug!(tab_id = event.tab_id, ?state, "Holding terminal event for unclaimed tab");
                    slot.insert(TabSlot::Early(state, Instant::now()));
                }
                None
            }
        };
        if let Some(event_id) = claimed {
            self.fire(&event_id, state);
        }
    }

    /// Registers `session` and subscribes it on `bus`.
    ///
    /// If the tab already reached a terminal state while it was being
    /// opened, the returned handle resolves with that state immediately.
    pub fn open(self: &Arc<Self>, bus: &LifecycleBus, session: TabSession) -> SessionHandle {
        let (fire, terminal) = oneshot::channel();
        let event_id = session.event_id.clone();
        let tab_id = session.tab_id;

        self.pending
            .insert(event_id.clone(), PendingSession { session, fire });

        let early = match self.slots.entry(tab_id) {
            Entry::Occupied(mut slot) => {
                let early = match slot.get() {
                    TabSlot::Early(state, _) => Some(*state),
                    TabSlot::Claimed(_) => None,
                };
                slot.insert(TabSlot::Claimed(event_id.clone()));
                early
            }
            Entry::Vacant(slot) => {
                slot.insert(TabSlot::Claimed(event_id.clone()));
                None
            }
        };

        let table = Arc::clone(self);
        let key = event_id.clone();
        bus.subscribe(event_id.clone(), move |event: &TabEvent| {
            if event.tab_id != tab_id {
                return Ok(());
            }
            if let Some(state) = event.status.terminal() {
                table.fire(&key, state);
            }
            Ok(())
        });

        if let Some(state) = early {
            self.fire(&event_id, state);
        }

        SessionHandle {
            event_id,
            tab_id,
            terminal,
            bus: bus.clone(),
        }
    }

    fn take(&self, event_id: &str) -> Option<PendingSession> {
        let (_, pending) = self.pending.remove(event_id)?;
        self.slots.remove_if(&pending.session.tab_id, |_, slot| {
            matches!(slot, TabSlot::Claimed(owner) if owner == event_id)
        });
        Some(pending)
    }

    fn fire(&self, event_id: &str, state: TabTerminal) -> bool {
        match self.take(event_id) {
            Some(pending) => {
                debug!(event_id = %event_id, tab_id = pending.session.tab_id, ?state, "Tab session fired");
                pending.fire.send(state).is_ok()
            }
            None => false,
        }
    }

    /// Withdraws a still-pending session without firing it.
    ///
    /// Returns false if the session already fired or was swept.
    pub fn cancel(&self, bus: &LifecycleBus, event_id: &str) -> bool {
        if self.take(event_id).is_none() {
            return false;
        }
        bus.unsubscribe(event_id);
        true
    }

    /// Removes every pending session of `task_id` in `phase`.
    ///
    /// Their subscriptions are dropped and their waiters resolve with no
    /// terminal state. The caller owns closing the returned tabs.
    pub fn sweep(&self, bus: &LifecycleBus, task_id: Uuid, phase: Phase) -> Vec<TabSession> {
        self.sweep_where(bus, |s| s.task_id == task_id && s.phase == phase)
    }

    /// Removes every pending session regardless of task.
    pub fn sweep_all(&self, bus: &LifecycleBus) -> Vec<TabSession> {
        self.sweep_where(bus, |_| true)
    }

    fn sweep_where<F>(&self, bus: &LifecycleBus, predicate: F) -> Vec<TabSession>
    where
        F: Fn(&TabSession) -> bool,
    {
        let keys: Vec<String> = self
            .pending
            .iter()
            .filter(|entry| predicate(&entry.value().session))
            .map(|entry| entry.key().clone())
            .collect();

        keys.into_iter()
            .filter_map(|key| {
                let pending = self.take(&key)?;
                bus.unsubscribe(&key);
                Some(pending.session)
            })
            .collect()
    }

    /// Returns the number of pending sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if no session is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of terminal events held for unclaimed tabs.
    #[must_use]
    pub fn early_events(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot.value(), TabSlot::Early(..)))
            .count()
    }
}

/// Keeps early lifecycle events recorded while a tab is being opened.
///
/// Dropping the last guard discards held events older than a minute.
#[must_use = "early events are only recorded while the guard is alive"]
pub struct OpeningGuard<'a> {
    table: &'a SessionTable,
}

impl Drop for OpeningGuard<'_> {
    fn drop(&mut self) {
        if self.table.opening.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.table.slots.retain(|_, slot| match slot {
                TabSlot::Early(_, at) => at.elapsed() < EARLY_EVENT_TTL,
                TabSlot::Claimed(_) => true,
            });
        }
    }
}

impl fmt::Debug for SessionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTable")
            .field("pending", &self.len())
            .field("opening", &self.opening.load(Ordering::SeqCst))
            .finish()
    }
}

/// The waiting side of an open session.
#[derive(Debug)]
pub struct SessionHandle {
    event_id: String,
    tab_id: TabId,
    terminal: oneshot::Receiver<TabTerminal>,
    bus: LifecycleBus,
}

impl SessionHandle {
    /// The session's event id.
    #[must_use]
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    /// The session's tab.
    #[must_use]
    pub fn tab_id(&self) -> TabId {
        self.tab_id
    }

    /// Waits for the terminal lifecycle state and drops the subscription.
    ///
    /// Returns `None` if the session was swept before the tab got there.
    pub async fn terminal(self) -> Option<TabTerminal> {
        let state = self.terminal.await.ok();
        self.bus.unsubscribe(&self.event_id);
        state
    }
}
