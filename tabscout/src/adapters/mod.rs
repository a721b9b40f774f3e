//! Site adapters: which search URL to open and which script scrapes it.

mod resolver;

pub use resolver::{extract_host, resolve, SearchEngine, SiteAdapter, DEFAULT_SCRIPT_ID};
