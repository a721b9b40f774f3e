//! Testing utilities for research tasks.
//!
//! This module provides:
//! - A scripted in-process browser that emits lifecycle events
//! - Reply builders for discovery and extraction scripts

mod browser;

pub use browser::{content_reply, links_reply, PageScript, ScriptedBrowser};
