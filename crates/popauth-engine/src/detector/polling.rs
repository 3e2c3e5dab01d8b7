//! Interval-driven redirect detection for plain browser windows.
//!
//! Browsers block reads of a window's location while it shows another
//! origin's page, so the only way to notice the provider's redirect back to
//! our origin is to keep trying. Every tick:
//!
//! 1. emit a heartbeat on every Nth tick,
//! 2. check whether the popup has been closed,
//! 3. try to read its location; a failed read means "still on the provider",
//! 4. hand a successful read to the resolver.
//!
//! The closure check always runs before the location read.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, MissedTickBehavior};

use super::{RedirectDetector, Step};
use crate::config::{DEFAULT_HEARTBEAT_EVERY, DEFAULT_POLL_INTERVAL_MS, PopupConfig};
use crate::diagnostics::DiagnosticEvent;
use crate::error::{PopupError, Result};
use crate::params::ParsedParams;
use crate::pending::PendingAuthorization;
use crate::resolver::resolve;

/// Shortest interval the ticker accepts.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Polls a popup's location on a fixed interval.
#[derive(Debug, Clone)]
pub struct PollingDetector {
    interval: Duration,
    heartbeat_every: u64,
    timeout: Option<Duration>,
}

impl Default for PollingDetector {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            heartbeat_every: u64::from(DEFAULT_HEARTBEAT_EVERY),
            timeout: None,
        }
    }
}

impl PollingDetector {
    /// Poll every `interval`. Intervals shorter than 1 ms are raised to 1 ms.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(MIN_POLL_INTERVAL),
            ..Self::default()
        }
    }

    pub fn from_config(config: &PopupConfig) -> Self {
        Self {
            interval: config.poll_interval().max(MIN_POLL_INTERVAL),
            heartbeat_every: u64::from(config.heartbeat_every.max(1)),
            timeout: config.timeout(),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one poll against `pending`. `tick` counts from zero.
    ///
    /// A settled `pending` is left untouched.
    pub fn tick(&self, pending: &mut PendingAuthorization, tick: u64) -> Step {
        if pending.is_settled() {
            return Step::Done;
        }

        let heartbeat = tick % self.heartbeat_every == 0;
        if heartbeat {
            tracing::trace!(pending_id = %pending.id(), tick, "polling popup");
            pending
                .diagnostics()
                .emit(DiagnosticEvent::breadcrumb("Polling.").with_field("tick", tick));
        }

        // A missing handle or an indeterminate flag counts as closed.
        let read = pending
            .window()
            .filter(|window| window.closed() == Some(false))
            .map(|window| window.location());
        let Some(read) = read else {
            tracing::debug!(pending_id = %pending.id(), tick, "popup closed before redirect");
            pending.diagnostics().log("Popup window was closed.");
            pending.settle(Err(PopupError::PopupClosedByUser));
            return Step::Done;
        };

        let snapshot = match read {
            Ok(snapshot) => snapshot,
            Err(err) => {
                if heartbeat {
                    tracing::trace!(pending_id = %pending.id(), error = %err, "location unreadable");
                    pending.diagnostics().emit(
                        DiagnosticEvent::breadcrumb("Popup location unreadable.")
                            .with_field("error", err.to_string()),
                    );
                }
                return Step::Continue;
            }
        };

        let Some(outcome) = resolve(&snapshot, pending.expected_path()).into_outcome() else {
            return Step::Continue;
        };

        tracing::debug!(pending_id = %pending.id(), url = %snapshot.href, "redirect detected");
        let diagnostics = pending.diagnostics().clone();
        match &outcome {
            Ok(_) => diagnostics.breadcrumb("Redirect detected with parameters."),
            Err(PopupError::MissingRedirectParams) => {
                diagnostics.log("Redirect detected without parameters.");
            }
            Err(err) => diagnostics.emit(
                DiagnosticEvent::breadcrumb("Redirect carried a provider error.")
                    .with_field("error", err.to_string()),
            ),
        }

        pending.close_window();
        pending.settle(outcome);
        diagnostics.log("Closed popup after polling detected redirect.");
        Step::Done
    }
}

#[async_trait]
impl RedirectDetector for PollingDetector {
    async fn wait(&self, mut pending: PendingAuthorization) -> Result<ParsedParams> {
        tracing::debug!(
            pending_id = %pending.id(),
            redirect_uri = pending.redirect_uri(),
            interval_ms = self.interval.as_millis() as u64,
            "starting popup poll"
        );
        pending.diagnostics().breadcrumb("Starting poll.");

        let start = Instant::now();
        // A timeout too large to represent is no deadline at all.
        let deadline = self.timeout.and_then(|timeout| start.checked_add(timeout));
        let mut ticker = tokio::time::interval_at(start + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut tick: u64 = 0;
        loop {
            ticker.tick().await;

            if let Some(deadline) = deadline
                && Instant::now() >= deadline
            {
                let timeout_ms = self.timeout.map_or(0, |t| t.as_millis() as u64);
                tracing::warn!(pending_id = %pending.id(), timeout_ms, "popup wait timed out");
                pending.close_window();
                pending.settle(Err(PopupError::WaitTimeout { timeout_ms }));
                break;
            }

            if self.tick(&mut pending, tick) == Step::Done {
                break;
            }
            tick += 1;
        }

        drop(ticker);
        pending.diagnostics().breadcrumb("Poll interval canceled.");
        pending.finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
