//! Opening the popup and waiting for its outcome.
//!
//! [`PopupLauncher`] is the entry point for host code. It centers the popup
//! over the opener, picks a window target, opens and focuses the window,
//! then hands the wait to the detector the environment calls for.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::PopupConfig;
use crate::detector::{DetectorKind, EventDrivenDetector, PollingDetector, RedirectDetector};
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink, Diagnostics, NoopSink};
use crate::error::{PopupError, Result};
use crate::params::ParsedParams;
use crate::pending::PendingAuthorization;
use crate::window::{HostEnvironment, PopupWindow, WindowOpener};

/// Target that replaces the page instead of opening a named popup.
const BLANK_TARGET: &str = "_blank";

/// Address that polling popups are explicitly navigated to after opening.
const ABOUT_BLANK: &str = "about:blank";

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// Caller-requested popup size. Missing or zero dimensions use the defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopupOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Final size and position of the popup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopupFeatures {
    pub width: u32,
    pub height: u32,
    pub top: f64,
    pub left: f64,
}

impl PopupFeatures {
    /// Center a `width` x `height` popup over the opener.
    ///
    /// Horizontally centered; vertically placed slightly above center.
    pub fn centered(env: &HostEnvironment, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            top: env.screen_y + (env.outer_height - f64::from(height)) / 2.5,
            left: env.screen_x + (env.outer_width - f64::from(width)) / 2.0,
        }
    }
}

/// Renders the `window.open` feature string: `width=W,height=H,top=T,left=L`.
impl std::fmt::Display for PopupFeatures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "width={},height={},top={},left={}",
            self.width, self.height, self.top, self.left
        )
    }
}

/// Pick the window target for `name` in this environment.
///
/// Wrapped containers and browsers that mishandle named popups get
/// `_blank`.
pub fn window_target<'a>(env: &HostEnvironment, name: &'a str) -> &'a str {
    if env.wrapped_container || env.mishandles_named_popups() {
        BLANK_TARGET
    } else {
        name
    }
}

// ---------------------------------------------------------------------------
// PopupLauncher
// ---------------------------------------------------------------------------

/// Opens authorization popups and waits for their redirects.
///
/// Every call to [`PopupLauncher::open`] creates its own
/// [`PendingAuthorization`], so concurrent calls share no state.
pub struct PopupLauncher {
    opener: Arc<dyn WindowOpener>,
    config: PopupConfig,
    diagnostics: Diagnostics,
}

impl PopupLauncher {
    /// Create a launcher that discards diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`PopupError::InvalidConfig`] if `config` fails validation.
    pub fn new(opener: Arc<dyn WindowOpener>, config: PopupConfig) -> Result<Self> {
        config.validate()?;
        let diagnostics = Diagnostics::new(Arc::new(NoopSink), config.diagnostic_source.clone());
        Ok(Self {
            opener,
            config,
            diagnostics,
        })
    }

    /// Send diagnostics to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = Diagnostics::new(sink, self.config.diagnostic_source.clone());
        self
    }

    pub fn config(&self) -> &PopupConfig {
        &self.config
    }

    /// Build the detector for `kind` from this launcher's config.
    pub fn detector(&self, kind: DetectorKind) -> Box<dyn RedirectDetector> {
        match kind {
            DetectorKind::Polling => Box::new(PollingDetector::from_config(&self.config)),
            DetectorKind::EventDriven => Box::new(EventDrivenDetector::from_config(&self.config)),
        }
    }

    /// Open `url` in a popup and wait for it to reach `redirect_uri`.
    ///
    /// Resolves with the redirect's parameters.
    ///
    /// # Errors
    ///
    /// - [`PopupError::UrlParse`] if `redirect_uri` is not absolute.
    /// - [`PopupError::PopupClosedByUser`] if the popup was blocked or closed.
    /// - [`PopupError::ProviderError`] if the redirect carried an `error`.
    /// - [`PopupError::MissingRedirectParams`] if the redirect had no
    ///   parameters (polling only).
    /// - [`PopupError::AuthorizationFailed`] if the container failed to load
    ///   a page (event-driven only).
    /// - [`PopupError::WaitTimeout`] if a timeout is configured and elapses.
    pub async fn open(
        &self,
        url: &str,
        name: &str,
        options: PopupOptions,
        redirect_uri: &str,
    ) -> Result<ParsedParams> {
        Url::parse(redirect_uri)?;

        let (env, window) = self.launch(url, name, options);
        let Some(window) = window else {
            tracing::warn!(url, "popup was blocked");
            self.diagnostics.log("Popup window could not be opened.");
            return Err(PopupError::PopupClosedByUser);
        };

        let kind = DetectorKind::for_environment(&env);
        if kind == DetectorKind::Polling && url == ABOUT_BLANK {
            window.navigate(url);
        }

        let pending =
            PendingAuthorization::new(redirect_uri, Some(window), self.diagnostics.clone())?;
        tracing::info!(
            pending_id = %pending.id(),
            detector = %kind,
            redirect_uri,
            "waiting for popup redirect"
        );

        self.detector(kind).wait(pending).await
    }

    /// Open `url` in a popup without waiting for any outcome.
    ///
    /// # Errors
    ///
    /// Returns [`PopupError::PopupClosedByUser`] if the popup was blocked.
    pub fn open_detached(&self, url: &str, name: &str, options: PopupOptions) -> Result<()> {
        match self.launch(url, name, options) {
            (_, Some(_window)) => {
                tracing::debug!(url, "opened detached popup");
                Ok(())
            }
            (_, None) => {
                tracing::warn!(url, "detached popup was blocked");
                Err(PopupError::PopupClosedByUser)
            }
        }
    }

    /// Open and focus the popup.
    fn launch(
        &self,
        url: &str,
        name: &str,
        options: PopupOptions,
    ) -> (HostEnvironment, Option<Box<dyn PopupWindow>>) {
        let env = self.opener.environment();
        let width = options
            .width
            .filter(|w| *w > 0)
            .unwrap_or(self.config.default_width);
        let height = options
            .height
            .filter(|h| *h > 0)
            .unwrap_or(self.config.default_height);

        let features = PopupFeatures::centered(&env, width, height).to_string();
        let target = window_target(&env, name);

        tracing::debug!(url, target, features = %features, "opening popup");
        self.diagnostics.emit(
            DiagnosticEvent::breadcrumb("Opening popup.")
                .with_field("target", target)
                .with_field("features", features.as_str()),
        );

        let window = self.opener.open(url, target, &features);
        if let Some(window) = &window {
            window.focus();
        }
        (env, window)
    }
}

impl std::fmt::Debug for PopupLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopupLauncher")
            .field("config", &self.config)
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
