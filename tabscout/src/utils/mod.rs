//! Identifier and timestamp helpers.

use chrono::Utc;
use std::time::Instant;
use uuid::Uuid;

/// Generates a time-ordered task identifier (UUID v7).
#[must_use]
pub fn generate_task_id() -> Uuid {
    Uuid::now_v7()
}

/// Returns the current UTC time as an ISO 8601 string with microseconds.
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Milliseconds elapsed since `start`.
#[must_use]
pub fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
