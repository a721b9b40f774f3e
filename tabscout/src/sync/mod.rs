//! Synchronization primitives for phase completion tracking.

mod barrier;

pub use barrier::{BarrierWait, CompletionBarrier};
