//! Event-driven redirect detection for embedded webview containers.
//!
//! Containers report navigation lifecycle events, so there is nothing to
//! poll. A `Started` navigation whose URL begins with the redirect URI ends
//! the wait. The match is a prefix test rather than exact path equality,
//! so intermediate provider pages are skipped. A load failure or the
//! container exiting also end the wait.
//!
//! A redirect-prefixed navigation without any query or fragment does not
//! end the wait here; the polling detector rejects the same situation with
//! [`PopupError::MissingRedirectParams`].

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use url::Url;

use super::{RedirectDetector, Step};
use crate::config::PopupConfig;
use crate::diagnostics::DiagnosticEvent;
use crate::error::{PopupError, Result};
use crate::params::ParsedParams;
use crate::pending::PendingAuthorization;
use crate::resolver::extract_params;
use crate::window::NavigationEvent;

/// Waits on a webview's navigation events.
#[derive(Debug, Clone, Default)]
pub struct EventDrivenDetector {
    timeout: Option<Duration>,
}

impl EventDrivenDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &PopupConfig) -> Self {
        Self {
            timeout: config.timeout(),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Apply one navigation event to `pending`.
    ///
    /// Events arriving after the wait settled are ignored.
    pub fn on_event(&self, pending: &mut PendingAuthorization, event: NavigationEvent) -> Step {
        if pending.is_settled() {
            tracing::trace!(pending_id = %pending.id(), ?event, "event after settlement ignored");
            return Step::Done;
        }

        match event {
            NavigationEvent::Started { url } => self.on_navigation(pending, &url),
            NavigationEvent::Failed { message } => {
                tracing::debug!(pending_id = %pending.id(), %message, "popup navigation failed");
                pending.settle(Err(PopupError::AuthorizationFailed));
                Step::Done
            }
            NavigationEvent::Exited => {
                tracing::debug!(pending_id = %pending.id(), "popup container exited");
                pending.settle(Err(PopupError::PopupClosedByUser));
                Step::Done
            }
        }
    }

    fn on_navigation(&self, pending: &mut PendingAuthorization, url: &str) -> Step {
        pending.diagnostics().breadcrumb("Popup window loading.");

        if !url.starts_with(pending.redirect_uri()) {
            tracing::trace!(pending_id = %pending.id(), url, "navigation is not the redirect");
            pending.diagnostics().emit(
                DiagnosticEvent::breadcrumb("Waiting for redirect.")
                    .with_field("url", url)
                    .with_field("redirect_uri", pending.redirect_uri()),
            );
            return Step::Continue;
        }

        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(pending_id = %pending.id(), url, error = %err, "unparseable redirect url");
                return Step::Continue;
            }
        };

        let query = parsed.query().unwrap_or_default();
        let fragment = parsed.fragment().unwrap_or_default();
        let Some(outcome) = extract_params(query, fragment) else {
            tracing::debug!(pending_id = %pending.id(), url, "redirect without parameters, still waiting");
            pending.diagnostics().emit(
                DiagnosticEvent::log("Redirect observed without parameters.").with_field("url", url),
            );
            return Step::Continue;
        };

        pending.settle(outcome);
        pending.close_window();
        pending
            .diagnostics()
            .log("Closed popup after navigation event detected redirect.");
        Step::Done
    }
}

#[async_trait]
impl RedirectDetector for EventDrivenDetector {
    async fn wait(&self, mut pending: PendingAuthorization) -> Result<ParsedParams> {
        pending.diagnostics().emit(
            DiagnosticEvent::breadcrumb("Adding navigation listeners.")
                .with_field("redirect_uri", pending.redirect_uri()),
        );

        let Some(events) = pending.window().map(|window| window.navigation_events()) else {
            pending.settle(Err(PopupError::PopupClosedByUser));
            return pending.finish();
        };
        let Some(mut events) = events else {
            tracing::warn!(pending_id = %pending.id(), "popup exposes no navigation events");
            pending.settle(Err(PopupError::EventsUnavailable));
            return pending.finish();
        };

        tracing::debug!(
            pending_id = %pending.id(),
            redirect_uri = pending.redirect_uri(),
            "listening for popup navigation"
        );

        // A timeout too large to represent is no deadline at all.
        let deadline = self
            .timeout
            .and_then(|timeout| Instant::now().checked_add(timeout));
        let expired = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(expired);

        loop {
            tokio::select! {
                biased;

                event = events.recv() => {
                    let Some(event) = event else {
                        // The container dropped its event source without saying goodbye.
                        pending.settle(Err(PopupError::PopupClosedByUser));
                        break;
                    };
                    if self.on_event(&mut pending, event) == Step::Done {
                        break;
                    }
                }
                () = &mut expired => {
                    let timeout_ms = self.timeout.map_or(0, |t| t.as_millis() as u64);
                    tracing::warn!(pending_id = %pending.id(), timeout_ms, "popup wait timed out");
                    pending.close_window();
                    pending.settle(Err(PopupError::WaitTimeout { timeout_ms }));
                    break;
                }
            }
        }

        pending.finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
