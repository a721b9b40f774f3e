//! Keyed publish/subscribe registry.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Result returned by a bus handler. An `Err` is logged and suppressed.
pub type HandlerResult = Result<(), String>;

/// A handler registered on an [`EventBus`].
pub type Handler<E> = Arc<dyn Fn(&E) -> HandlerResult + Send + Sync>;

/// A keyed publish/subscribe registry.
///
/// Every published event reaches every registered handler. Handlers filter
/// what they care about and remove themselves once done; the bus never drops
/// a subscription on its own. Cloning the bus yields another handle to the
/// same subscriber table.
pub struct EventBus<E> {
    handlers: Arc<RwLock<HashMap<String, Handler<E>>>>,
}

impl<E> EventBus<E> {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers `handler` under `id`.
    ///
    /// Returns `true` if an existing handler with the same id was replaced.
    pub fn subscribe<F>(&self, id: impl Into<String>, handler: F) -> bool
    where
        F: Fn(&E) -> HandlerResult + Send + Sync + 'static,
    {
        let id = id.into();
        let replaced = self
            .handlers
            .write()
            .insert(id.clone(), Arc::new(handler))
            .is_some();
        if replaced {
            warn!(subscription = %id, "Replaced existing bus subscription");
        }
        replaced
    }

    /// Removes the handler registered under `id`.
    ///
    /// Returns `true` if a handler was removed.
    pub fn unsubscribe(&self, id: &str) -> bool {
        self.handlers.write().remove(id).is_some()
    }

    /// Delivers `event` to every handler registered at the time of the call.
    ///
    /// The table lock is released before handlers run, so a handler may
    /// subscribe or unsubscribe freely. Errors and panics are logged per
    /// handler and never stop delivery to the rest.
    pub fn publish(&self, event: &E) -> usize {
        let snapshot: Vec<(String, Handler<E>)> = self
            .handlers
            .read()
            .iter()
            .map(|(id, handler)| (id.clone(), handler.clone()))
            .collect();

        for (id, handler) in &snapshot {
            match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(subscription = %id, error = %e, "Bus handler failed");
                }
                Err(panic) => {
                    warn!(subscription = %id, "Bus handler panicked: {:?}", panic);
                }
            }
        }

        snapshot.len()
    }

    /// Returns whether a handler is registered under `id`.
    #[must_use]
    pub fn is_subscribed(&self, id: &str) -> bool {
        self.handlers.read().contains_key(id)
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Returns true if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Removes every handler.
    pub fn clear(&self) {
        self.handlers.write().clear();
    }
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
        }
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.len())
            .finish()
    }
}
