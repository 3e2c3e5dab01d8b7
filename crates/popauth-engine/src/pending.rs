//! The single in-flight wait owned by one `open` call.

use url::Url;
use uuid::Uuid;

use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::error::{PopupError, Result};
use crate::location::normalize_path;
use crate::params::ParsedParams;
use crate::window::PopupWindow;

/// Where a pending authorization is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Waiting,
    Resolved,
    Rejected,
}

/// One wait for a redirect, with the popup it watches.
///
/// Owns its window handle outright; nothing is shared between pending
/// authorizations. The state moves out of [`AuthState::Waiting`] at most
/// once. Later settlements are ignored.
pub struct PendingAuthorization {
    id: Uuid,
    redirect_uri: String,
    expected_path: String,
    window: Option<Box<dyn PopupWindow>>,
    state: AuthState,
    outcome: Option<Result<ParsedParams>>,
    diagnostics: Diagnostics,
}

impl PendingAuthorization {
    /// Start a wait for `redirect_uri` on `window`.
    ///
    /// `window` is `None` when the popup was blocked; detectors treat that as
    /// a closed popup.
    ///
    /// # Errors
    ///
    /// Returns [`PopupError::UrlParse`] if `redirect_uri` is not an absolute
    /// URL.
    pub fn new(
        redirect_uri: &str,
        window: Option<Box<dyn PopupWindow>>,
        diagnostics: Diagnostics,
    ) -> Result<Self> {
        let expected_path = normalize_path(&Url::parse(redirect_uri)?);
        Ok(Self {
            id: Uuid::now_v7(),
            redirect_uri: redirect_uri.to_string(),
            expected_path,
            window,
            state: AuthState::Waiting,
            outcome: None,
            diagnostics,
        })
    }

    /// Unique id of this wait, used to correlate log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The redirect URI exactly as given by the caller.
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// The normalized redirect path, computed once at creation.
    pub fn expected_path(&self) -> &str {
        &self.expected_path
    }

    /// The popup being watched, if the opener returned one.
    pub fn window(&self) -> Option<&dyn PopupWindow> {
        self.window.as_deref()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Whether an outcome has been recorded.
    pub fn is_settled(&self) -> bool {
        self.state != AuthState::Waiting
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Record the outcome of the wait.
    ///
    /// Returns `true` if this call settled the wait, `false` if it had
    /// already been settled (the new outcome is dropped).
    pub fn settle(&mut self, outcome: Result<ParsedParams>) -> bool {
        if self.is_settled() {
            tracing::trace!(pending_id = %self.id, "ignoring settlement of finished wait");
            return false;
        }

        match &outcome {
            Ok(params) => {
                self.state = AuthState::Resolved;
                tracing::info!(
                    pending_id = %self.id,
                    params = params.len(),
                    "popup authorization resolved"
                );
            }
            Err(err) => {
                self.state = AuthState::Rejected;
                tracing::info!(
                    pending_id = %self.id,
                    kind = err.kind(),
                    error = %err,
                    "popup authorization rejected"
                );
                self.diagnostics.emit(
                    DiagnosticEvent::log("Popup authorization rejected.")
                        .with_field("kind", err.kind())
                        .with_field("error", err.to_string()),
                );
            }
        }

        self.outcome = Some(outcome);
        true
    }

    /// Close the popup, if there is one.
    pub fn close_window(&self) {
        if let Some(window) = &self.window {
            window.close();
            tracing::debug!(pending_id = %self.id, "popup window closed");
        }
    }

    /// Consume the wait and hand back its outcome.
    ///
    /// An unsettled wait has no outcome; this is reported as a closed popup,
    /// since the only way to abandon a wait is to drop its window.
    pub fn finish(self) -> Result<ParsedParams> {
        self.outcome.unwrap_or(Err(PopupError::PopupClosedByUser))
    }
}

impl std::fmt::Debug for PendingAuthorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingAuthorization")
            .field("id", &self.id)
            .field("redirect_uri", &self.redirect_uri)
            .field("expected_path", &self.expected_path)
            .field("has_window", &self.window.is_some())
            .field("state", &self.state)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
