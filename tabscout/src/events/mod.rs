//! Event plumbing.
//!
//! This module provides:
//! - [`EventBus`], the keyed publish/subscribe registry tab sessions wait on
//! - Tab lifecycle event types delivered over that bus
//! - [`EventSink`] implementations for task progress observability

mod bus;
mod lifecycle;
mod sink;

pub use bus::{EventBus, Handler, HandlerResult};
pub use lifecycle::{LifecycleBus, TabEvent, TabStatus, TabTerminal};
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
