//! Engine configuration.
//!
//! All fields have defaults that reproduce the stock behavior: poll every
//! 500 ms, heartbeat every 5th tick, 500x500 popups, no wait ceiling. A
//! TOML file only needs the keys it wants to change:
//!
//! ```toml
//! poll_interval_ms = 250
//! timeout_secs = 300
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::diagnostics::DEFAULT_SOURCE;
use crate::error::{PopupError, Result};

/// Default polling cadence in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Default number of ticks between polling heartbeats.
pub const DEFAULT_HEARTBEAT_EVERY: u32 = 5;

/// Default popup width and height in pixels.
pub const DEFAULT_POPUP_SIZE: u32 = 500;

/// Largest accepted `timeout_secs` (one day).
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Tunables for the launcher and its detectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopupConfig {
    /// Interval between location polls.
    pub poll_interval_ms: u64,

    /// Emit a polling heartbeat on every Nth tick.
    pub heartbeat_every: u32,

    /// Popup width used when the caller does not give one.
    pub default_width: u32,

    /// Popup height used when the caller does not give one.
    pub default_height: u32,

    /// Give up waiting after this many seconds. `None` waits forever.
    pub timeout_secs: Option<u64>,

    /// Value of the `source` field on diagnostic events.
    pub diagnostic_source: String,
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            heartbeat_every: DEFAULT_HEARTBEAT_EVERY,
            default_width: DEFAULT_POPUP_SIZE,
            default_height: DEFAULT_POPUP_SIZE,
            timeout_secs: None,
            diagnostic_source: DEFAULT_SOURCE.to_string(),
        }
    }
}

impl PopupConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`PopupError::ConfigParse`] on malformed TOML and
    /// [`PopupError::InvalidConfig`] if a value is out of range.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`PopupError::Io`] if the file cannot be read, plus the
    /// errors of [`PopupConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&raw)?;
        tracing::debug!(path = %path.display(), "loaded popup config");
        Ok(config)
    }

    /// Reject values the detectors cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`PopupError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms must be greater than zero"));
        }
        if self.heartbeat_every == 0 {
            return Err(invalid("heartbeat_every must be greater than zero"));
        }
        if self.default_width == 0 || self.default_height == 0 {
            return Err(invalid("default popup dimensions must be greater than zero"));
        }
        if self.timeout_secs == Some(0) {
            return Err(invalid("timeout_secs must be greater than zero when set"));
        }
        if self.timeout_secs.is_some_and(|secs| secs > MAX_TIMEOUT_SECS) {
            return Err(invalid("timeout_secs must not exceed one day"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn invalid(reason: &str) -> PopupError {
    PopupError::InvalidConfig {
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
