//! App configuration.
//!
//! Options can be built in code or loaded from JSON:
//!
//! ```rust,ignore
//! let options = AppOptions::from_json(r#"{ "ticker": "manual", "dev_mode": true }"#)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which host primitive drives scheduler flushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickerKind {
    /// Idle ticker when an async runtime is running, manual otherwise.
    #[default]
    Auto,
    Idle,
    Microtask,
    Timeout,
    /// Ticks only when the host calls `advance`. Deterministic; used by tests.
    Manual,
}

/// How the reconciler attaches event handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventMode {
    /// One listener per element and event.
    #[default]
    PerElement,
    /// Common bubbling events are handled by one listener on the mount
    /// container.
    Delegated,
}

/// Options accepted by [`create_app`](crate::create_app).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppOptions {
    /// Label used in log spans.
    pub name: Option<String>,
    /// Enables hook-order checks.
    pub dev_mode: bool,
    pub ticker: TickerKind,
    pub event_mode: EventMode,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            name: None,
            dev_mode: cfg!(debug_assertions),
            ticker: TickerKind::default(),
            event_mode: EventMode::default(),
        }
    }
}

impl AppOptions {
    /// Parse options from a JSON document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| Error::Config(err.to_string()))
    }

    pub fn with_ticker(mut self, ticker: TickerKind) -> Self {
        self.ticker = ticker;
        self
    }

    pub fn with_event_mode(mut self, event_mode: EventMode) -> Self {
        self.event_mode = event_mode;
        self
    }

    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fills_defaults() {
        let options = AppOptions::from_json(r#"{ "ticker": "manual", "event_mode": "delegated" }"#)
            .unwrap();
        assert_eq!(options.ticker, TickerKind::Manual);
        assert_eq!(options.event_mode, EventMode::Delegated);
        assert_eq!(options.dev_mode, cfg!(debug_assertions));
        assert!(options.name.is_none());
    }

    #[test]
    fn bad_json_is_a_config_error() {
        let err = AppOptions::from_json(r#"{ "ticker": "sometimes" }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
