//! Browser collaborators: the popup window and the thing that opens it.
//!
//! The engine never touches a real browser. Hosts implement [`PopupWindow`]
//! and [`WindowOpener`] over whatever they have: a DOM `Window`, an embedded
//! webview, or a scripted fake in tests.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::LocationError;
use crate::location::LocationSnapshot;

// ---------------------------------------------------------------------------
// Navigation events
// ---------------------------------------------------------------------------

/// Lifecycle events reported by an embedded webview container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NavigationEvent {
    /// The container began loading `url`.
    Started { url: String },
    /// The container failed to load a page.
    Failed { message: String },
    /// The container was closed.
    Exited,
}

/// Receiving half of a window's navigation event stream.
pub type NavigationEvents = mpsc::UnboundedReceiver<NavigationEvent>;

// ---------------------------------------------------------------------------
// PopupWindow
// ---------------------------------------------------------------------------

/// Handle to an opened popup.
///
/// Each handle is owned by exactly one pending authorization.
pub trait PopupWindow: Send + Sync {
    /// The window's `closed` flag. `None` means it could not be determined,
    /// which callers treat as closed.
    fn closed(&self) -> Option<bool>;

    /// Read the window's current address.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError`] while the window shows a page from another
    /// origin.
    fn location(&self) -> Result<LocationSnapshot, LocationError>;

    /// Point the window at a new address.
    fn navigate(&self, url: &str);

    /// Bring the window to the front, if supported.
    fn focus(&self) {}

    /// Close the window. Closing an already closed window is a no-op.
    fn close(&self);

    /// Take the window's navigation event stream, if it has one.
    ///
    /// Plain browser windows return `None`. Webview containers return the
    /// stream once; later calls may return `None`.
    fn navigation_events(&self) -> Option<NavigationEvents> {
        None
    }
}

// ---------------------------------------------------------------------------
// Host environment
// ---------------------------------------------------------------------------

/// Facts about the opening window that placement and strategy depend on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostEnvironment {
    pub screen_x: f64,
    pub screen_y: f64,
    pub outer_width: f64,
    pub outer_height: f64,
    pub user_agent: String,
    /// Running inside a wrapped mobile container (e.g. a hybrid app shell).
    pub wrapped_container: bool,
}

impl Default for HostEnvironment {
    fn default() -> Self {
        Self {
            screen_x: 0.0,
            screen_y: 0.0,
            outer_width: 1280.0,
            outer_height: 800.0,
            user_agent: String::new(),
            wrapped_container: false,
        }
    }
}

impl HostEnvironment {
    /// Whether the browser mishandles named popup targets.
    pub fn mishandles_named_popups(&self) -> bool {
        self.user_agent.contains("CriOS")
    }
}

// ---------------------------------------------------------------------------
// WindowOpener
// ---------------------------------------------------------------------------

/// Opens popups on behalf of the launcher.
pub trait WindowOpener: Send + Sync {
    /// Describe the environment the popup will be opened from.
    fn environment(&self) -> HostEnvironment;

    /// Open `url` in a window targeted at `target` with the given feature
    /// string. Returns `None` if the popup was blocked.
    fn open(&self, url: &str, target: &str, features: &str) -> Option<Box<dyn PopupWindow>>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
