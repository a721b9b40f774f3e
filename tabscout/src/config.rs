//! Configuration types for the research engine and tool surface.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ResearchError;

/// Timing configuration for the two crawl phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How long link discovery may take, in seconds.
    #[serde(default = "default_discovery_timeout")]
    pub discovery_timeout_seconds: f64,
    /// How long content extraction may take, in seconds.
    #[serde(default = "default_extraction_timeout")]
    pub extraction_timeout_seconds: f64,
    /// Pause between injecting a script and messaging it, in milliseconds.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
}

fn default_discovery_timeout() -> f64 {
    30.0
}

fn default_extraction_timeout() -> f64 {
    60.0
}

fn default_settle_delay() -> u64 {
    1000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            discovery_timeout_seconds: default_discovery_timeout(),
            extraction_timeout_seconds: default_extraction_timeout(),
            settle_delay_ms: default_settle_delay(),
        }
    }
}

impl EngineConfig {
    /// Creates a new engine configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the discovery timeout.
    #[must_use]
    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout_seconds = timeout.as_secs_f64();
        self
    }

    /// Sets the extraction timeout.
    #[must_use]
    pub fn with_extraction_timeout(mut self, timeout: Duration) -> Self {
        self.extraction_timeout_seconds = timeout.as_secs_f64();
        self
    }

    /// Sets the settle delay.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Gets the discovery timeout as Duration.
    #[must_use]
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.discovery_timeout_seconds.max(0.0))
    }

    /// Gets the extraction timeout as Duration.
    #[must_use]
    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.extraction_timeout_seconds.max(0.0))
    }

    /// Gets the settle delay as Duration.
    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Defaults applied to tool requests that omit optional fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Site searched when the request has no `url`.
    #[serde(default = "default_url")]
    pub default_url: String,
    /// Links kept per search when the request has no `maxResults`.
    #[serde(default = "default_max_results")]
    pub default_max_results: usize,
}

fn default_url() -> String {
    "https://google.com".to_string()
}

fn default_max_results() -> usize {
    5
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            default_url: default_url(),
            default_max_results: default_max_results(),
        }
    }
}

/// Combined configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Engine timing.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Tool request defaults.
    #[serde(default)]
    pub tool: ToolConfig,
}

impl ResearchConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ResearchError> {
        Ok(serde_json::from_str(raw)?)
    }
}
