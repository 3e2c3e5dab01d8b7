//! Scripted browser fakes for tests.
//!
//! Compiled for this crate's unit tests and, behind the `test-util`
//! feature, for integration tests and downstream crates.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::error::LocationError;
use crate::location::LocationSnapshot;
use crate::window::{
    HostEnvironment, NavigationEvent, NavigationEvents, PopupWindow, WindowOpener,
};

#[derive(Default)]
struct WindowState {
    closed: Option<bool>,
    href: Option<String>,
    events: Option<NavigationEvents>,
    navigated: Vec<String>,
    closed_checks: usize,
    location_reads: usize,
    close_calls: usize,
    focus_calls: usize,
}

/// A popup whose state tests flip by hand. Clones share state.
#[derive(Clone, Default)]
pub struct FakeWindow {
    state: Arc<Mutex<WindowState>>,
}

impl FakeWindow {
    /// An open popup showing another origin's page.
    pub fn cross_origin() -> Self {
        let window = Self::default();
        window.set_closed(Some(false));
        window
    }

    /// An open popup at a readable address.
    pub fn at(href: &str) -> Self {
        let window = Self::cross_origin();
        window.set_location(href);
        window
    }

    /// An open webview with a navigation event stream.
    pub fn with_events() -> (Self, mpsc::UnboundedSender<NavigationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let window = Self::cross_origin();
        window.lock().events = Some(rx);
        (window, tx)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WindowState> {
        self.state.lock().expect("fake window lock poisoned")
    }

    pub fn set_closed(&self, closed: Option<bool>) {
        self.lock().closed = closed;
    }

    pub fn set_location(&self, href: &str) {
        self.lock().href = Some(href.to_string());
    }

    /// How many times the `closed` flag was inspected.
    pub fn closed_checks(&self) -> usize {
        self.lock().closed_checks
    }

    pub fn location_reads(&self) -> usize {
        self.lock().location_reads
    }

    pub fn close_calls(&self) -> usize {
        self.lock().close_calls
    }

    pub fn focus_calls(&self) -> usize {
        self.lock().focus_calls
    }

    pub fn navigated(&self) -> Vec<String> {
        self.lock().navigated.clone()
    }
}

impl PopupWindow for FakeWindow {
    fn closed(&self) -> Option<bool> {
        let mut state = self.lock();
        state.closed_checks += 1;
        state.closed
    }

    fn location(&self) -> Result<LocationSnapshot, LocationError> {
        let mut state = self.lock();
        state.location_reads += 1;
        match &state.href {
            Some(href) => LocationSnapshot::parse(href)
                .map_err(|e| LocationError::cross_origin(e.to_string())),
            None => Err(LocationError::cross_origin("blocked a cross-origin frame")),
        }
    }

    fn navigate(&self, url: &str) {
        self.lock().navigated.push(url.to_string());
    }

    fn focus(&self) {
        self.lock().focus_calls += 1;
    }

    fn close(&self) {
        let mut state = self.lock();
        state.close_calls += 1;
        state.closed = Some(true);
    }

    fn navigation_events(&self) -> Option<NavigationEvents> {
        self.lock().events.take()
    }
}

/// Records every `open` call and hands out a prepared window.
#[derive(Clone, Default)]
pub struct FakeOpener {
    pub env: HostEnvironment,
    pub window: Option<FakeWindow>,
    pub opened: Arc<Mutex<Vec<(String, String, String)>>>,
}

impl FakeOpener {
    pub fn new(env: HostEnvironment, window: Option<FakeWindow>) -> Self {
        Self {
            env,
            window,
            opened: Arc::default(),
        }
    }

    pub fn opened(&self) -> Vec<(String, String, String)> {
        self.opened.lock().expect("opener lock poisoned").clone()
    }
}

impl WindowOpener for FakeOpener {
    fn environment(&self) -> HostEnvironment {
        self.env.clone()
    }

    fn open(&self, url: &str, target: &str, features: &str) -> Option<Box<dyn PopupWindow>> {
        self.opened.lock().expect("opener lock poisoned").push((
            url.to_string(),
            target.to_string(),
            features.to_string(),
        ));
        self.window
            .clone()
            .map(|window| Box::new(window) as Box<dyn PopupWindow>)
    }
}
