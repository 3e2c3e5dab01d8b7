//! Popup-based OAuth/SSO redirect detection.
//!
//! This crate opens an identity provider's authorization page in a popup,
//! waits for the popup to land on the application's redirect URI, and
//! returns the parameters the provider put in that redirect:
//!
//! - **Polling detection** for plain browser windows, which re-reads the
//!   popup's location on a fixed interval and tolerates cross-origin read
//!   failures.
//! - **Event-driven detection** for embedded webview containers, which
//!   reacts to navigation lifecycle events.
//! - **Outcome classification** shared by both: success with parameters,
//!   provider error, missing parameters, or popup closed.
//!
//! The browser itself is abstracted behind [`WindowOpener`] and
//! [`PopupWindow`], and observability goes to an injected
//! [`DiagnosticSink`].
//!
//! # Architecture
//!
//! ```text
//! PopupLauncher
//! ├── PopupFeatures        (placement + feature string)
//! ├── PendingAuthorization (one wait, owns the window)
//! └── RedirectDetector
//!     ├── PollingDetector      (interval + location reads)
//!     └── EventDrivenDetector  (navigation events)
//!         └── resolver         (match + classify)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use popauth_engine::{PopupConfig, PopupLauncher, PopupOptions, TracingSink, WindowOpener};
//!
//! # async fn example(opener: Arc<dyn WindowOpener>) -> popauth_engine::Result<()> {
//! let launcher = PopupLauncher::new(opener, PopupConfig::default())?
//!     .with_sink(Arc::new(TracingSink));
//!
//! let params = launcher
//!     .open(
//!         "https://idp.example.com/authorize?client_id=app",
//!         "idp",
//!         PopupOptions::default(),
//!         "https://app.example.com/cb",
//!     )
//!     .await?;
//!
//! println!("code: {:?}", params.get("code"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod detector;
pub mod diagnostics;
pub mod error;
pub mod launcher;
pub mod location;
pub mod params;
pub mod pending;
pub mod resolver;
pub mod window;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// Re-export key types at the crate root for convenience.
pub use config::PopupConfig;
pub use detector::{DetectorKind, EventDrivenDetector, PollingDetector, RedirectDetector, Step};
pub use diagnostics::{
    BroadcastSink, DiagnosticEvent, DiagnosticKind, DiagnosticSink, Diagnostics, NoopSink,
    TracingSink,
};
pub use error::{LocationError, PopupError, Result};
pub use launcher::{PopupFeatures, PopupLauncher, PopupOptions, window_target};
pub use location::{LocationSnapshot, normalize_path};
pub use params::{ParsedParams, parse_query_string};
pub use pending::{AuthState, PendingAuthorization};
pub use resolver::Decision;
pub use window::{HostEnvironment, NavigationEvent, NavigationEvents, PopupWindow, WindowOpener};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
