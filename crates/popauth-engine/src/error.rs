//! Error types for the popup auth engine.
//!
//! Every terminal failure of a wait surfaces as a [`PopupError`]. Reading the
//! popup's location has its own error type, [`LocationError`], because a
//! failed read during polling is expected noise and never settles a wait.

/// Unified error type for the popup auth engine.
#[derive(Debug, thiserror::Error)]
pub enum PopupError {
    /// The popup handle was lost or closed before a redirect was observed.
    #[error("the popup window was closed")]
    PopupClosedByUser,

    /// The redirect location matched but carried no query or fragment.
    ///
    /// Usually a client-side router rewrote the URL before it could be read.
    #[error(
        "OAuth redirect occurred but no query or fragment parameters were found; \
         they were not set during the redirect or were stripped by client-side routing"
    )]
    MissingRedirectParams,

    /// The identity provider put an explicit `error` in the redirect.
    #[error("{message}")]
    ProviderError {
        /// The provider's error string, verbatim.
        message: String,
    },

    /// The webview container reported a load or navigation failure.
    #[error("authorization failed")]
    AuthorizationFailed,

    /// The configured wait ceiling elapsed without an outcome.
    #[error("popup wait timed out after {timeout_ms} ms")]
    WaitTimeout {
        /// How long we waited, in milliseconds.
        timeout_ms: u64,
    },

    /// An event-driven wait was requested on a window without navigation events.
    #[error("popup window does not expose navigation events")]
    EventsUnavailable,

    /// Configuration is missing or malformed.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// TOML configuration could not be parsed.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// I/O error (e.g. reading a config file).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing error.
    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl PopupError {
    /// Whether this failure means the user dismissed the popup.
    pub fn is_user_cancelled(&self) -> bool {
        matches!(self, Self::PopupClosedByUser)
    }

    /// Short machine-readable kind, used in diagnostic payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PopupClosedByUser => "popup_closed_by_user",
            Self::MissingRedirectParams => "missing_redirect_params",
            Self::ProviderError { .. } => "provider_error",
            Self::AuthorizationFailed => "authorization_failed",
            Self::WaitTimeout { .. } => "wait_timeout",
            Self::EventsUnavailable => "events_unavailable",
            Self::InvalidConfig { .. } => "invalid_config",
            Self::ConfigParse(_) => "config_parse",
            Self::Io(_) => "io",
            Self::UrlParse(_) => "url_parse",
        }
    }
}

/// Reading the popup's location failed.
///
/// In a browser this is the same-origin guard tripping while the provider's
/// page is loaded. Detectors treat it as "not redirected yet".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("popup location unreadable: {reason}")]
pub struct LocationError {
    /// Why the read failed.
    pub reason: String,
}

impl LocationError {
    /// Build a cross-origin read failure with the given reason.
    pub fn cross_origin(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, PopupError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
