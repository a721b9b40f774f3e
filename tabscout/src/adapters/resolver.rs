//! Maps a target URL to the search engine adapter that handles it.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::form_urlencoded;

/// Search engines with a dedicated extraction script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchEngine {
    /// google.com
    Google,
    /// bing.com
    Bing,
    /// baidu.com
    Baidu,
    /// duckduckgo.com
    DuckDuckGo,
    /// github.com repository search
    GitHub,
    /// Any other host, searched with a `site:` scoped query.
    Default,
}

impl fmt::Display for SearchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Google => "google",
            Self::Bing => "bing",
            Self::Baidu => "baidu",
            Self::DuckDuckGo => "duckduckgo",
            Self::GitHub => "github",
            Self::Default => "default",
        };
        write!(f, "{name}")
    }
}

/// One row of the adapter table.
struct AdapterEntry {
    host: &'static str,
    engine: SearchEngine,
    script_id: &'static str,
}

/// Known hosts, matched in order.
const ADAPTER_TABLE: &[AdapterEntry] = &[
    AdapterEntry {
        host: "google.com",
        engine: SearchEngine::Google,
        script_id: "google",
    },
    AdapterEntry {
        host: "bing.com",
        engine: SearchEngine::Bing,
        script_id: "bing",
    },
    AdapterEntry {
        host: "baidu.com",
        engine: SearchEngine::Baidu,
        script_id: "baidu",
    },
    AdapterEntry {
        host: "duckduckgo.com",
        engine: SearchEngine::DuckDuckGo,
        script_id: "duckduckgo",
    },
    AdapterEntry {
        host: "github.com",
        engine: SearchEngine::GitHub,
        script_id: "github",
    },
];

/// Script used when no table entry matches.
pub const DEFAULT_SCRIPT_ID: &str = "default";

/// How to search a site and which script scrapes its pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SiteAdapter {
    engine: SearchEngine,
    script_id: &'static str,
}

impl SiteAdapter {
    /// The adapter used for hosts with no table entry.
    #[must_use]
    pub const fn default_adapter() -> Self {
        Self {
            engine: SearchEngine::Default,
            script_id: DEFAULT_SCRIPT_ID,
        }
    }

    /// The engine this adapter searches with.
    #[must_use]
    pub fn engine(&self) -> SearchEngine {
        self.engine
    }

    /// Identifier of the extraction script injected into tabs.
    #[must_use]
    pub fn script_id(&self) -> &'static str {
        self.script_id
    }

    /// Returns true for the fallback adapter.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.engine == SearchEngine::Default
    }

    /// Builds the results-page URL for `keyword`.
    ///
    /// Dedicated engines ignore `target_url`. The default adapter scopes the
    /// query to the target's host.
    #[must_use]
    pub fn build_search_url(&self, target_url: &str, keyword: &str) -> String {
        match self.engine {
            SearchEngine::Google => format!("https://www.google.com/search?q={}", encode(keyword)),
            SearchEngine::Bing => format!("https://www.bing.com/search?q={}", encode(keyword)),
            SearchEngine::Baidu => format!("https://www.baidu.com/s?wd={}", encode(keyword)),
            SearchEngine::DuckDuckGo => format!("https://duckduckgo.com/?q={}", encode(keyword)),
            SearchEngine::GitHub => format!(
                "https://github.com/search?q={}&type=repositories",
                encode(keyword)
            ),
            SearchEngine::Default => {
                let scoped = format!("site:{} {}", extract_host(target_url), keyword);
                format!("https://www.google.com/search?q={}", encode(&scoped))
            }
        }
    }
}

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Extracts the host portion of a URL.
///
/// Strips the scheme and everything after the host, and lower-cases the
/// result. Input without a scheme is treated as starting with the host.
#[must_use]
pub fn extract_host(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    rest[..end].to_ascii_lowercase()
}

fn host_matches(candidate: &str, host: &str) -> bool {
    candidate == host
        || candidate
            .strip_suffix(host)
            .is_some_and(|prefix| prefix.ends_with('.') || prefix.ends_with('/'))
}

/// Resolves the adapter for `target_url`.
///
/// Pure: the same input always yields the same adapter.
#[must_use]
pub fn resolve(target_url: &str) -> SiteAdapter {
    let candidate = extract_host(target_url);
    ADAPTER_TABLE
        .iter()
        .find(|entry| host_matches(&candidate, entry.host))
        .map_or_else(SiteAdapter::default_adapter, |entry| SiteAdapter {
            engine: entry.engine,
            script_id: entry.script_id,
        })
}
