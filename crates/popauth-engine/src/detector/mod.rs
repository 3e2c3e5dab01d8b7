//! Redirect detection strategies.
//!
//! Two strategies watch a popup for the provider's redirect:
//!
//! - [`PollingDetector`] reads the window's location on a fixed interval.
//!   It is used for plain browser windows, which offer no navigation
//!   events.
//! - [`EventDrivenDetector`] reacts to navigation events from an embedded
//!   webview container.
//!
//! Both implement [`RedirectDetector`]. Both advance through a synchronous
//! step function, so a single observation can be tested without a clock.

mod events;
mod polling;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use events::EventDrivenDetector;
pub use polling::PollingDetector;

use crate::error::Result;
use crate::params::ParsedParams;
use crate::pending::PendingAuthorization;
use crate::window::HostEnvironment;

/// Waits on a pending authorization until it settles.
#[async_trait]
pub trait RedirectDetector: Send + Sync {
    /// Drive `pending` to a terminal state and return its outcome.
    async fn wait(&self, pending: PendingAuthorization) -> Result<ParsedParams>;
}

/// What a detector step decided about the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Keep watching.
    Continue,
    /// The wait is settled; stop.
    Done,
}

/// Which detection strategy an environment calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Polling,
    EventDriven,
}

impl DetectorKind {
    /// Wrapped mobile containers get navigation events; everything else polls.
    pub fn for_environment(env: &HostEnvironment) -> Self {
        if env.wrapped_container {
            Self::EventDriven
        } else {
            Self::Polling
        }
    }
}

impl std::fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Polling => write!(f, "polling"),
            Self::EventDriven => write!(f, "event_driven"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
