//! Fire-and-forget diagnostic events.
//!
//! Detectors leave a trail of [`DiagnosticEvent`]s as they run: breadcrumbs
//! for routine progress and log entries for notable transitions. Events go
//! to an injected [`DiagnosticSink`]. Emission never fails and never
//! affects control flow.
//!
//! Three sinks are provided:
//!
//! - [`NoopSink`] discards everything (the default).
//! - [`TracingSink`] forwards events to `tracing`.
//! - [`BroadcastSink`] fans events out to subscribers over
//!   [`tokio::sync::broadcast`], so a host page or test can observe them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

/// Default value of the `source` field on emitted events.
pub const DEFAULT_SOURCE: &str = "popauth";

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// How prominent a diagnostic event is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// Routine progress, emitted often.
    #[serde(rename = "SSO_BREADCRUMB")]
    Breadcrumb,
    /// A notable state change worth keeping in logs.
    #[serde(rename = "SSO_LOG")]
    Log,
}

/// A single diagnostic event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    #[serde(rename = "type")]
    pub kind: DiagnosticKind,
    pub message: String,
    /// Emitter identity, so hosts can filter events.
    pub source: String,
    /// Extra context such as the error text or the navigated URL.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl DiagnosticEvent {
    pub fn breadcrumb(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Breadcrumb, message)
    }

    pub fn log(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Log, message)
    }

    fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: DEFAULT_SOURCE.to_string(),
            fields: Map::new(),
            timestamp: Utc::now(),
        }
    }

    /// Attach a context field.
    #[must_use]
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Destination for diagnostic events.
///
/// Implementations must not block and must swallow their own failures.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, event: DiagnosticEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl DiagnosticSink for NoopSink {
    fn emit(&self, _event: DiagnosticEvent) {}
}

/// Forwards events to `tracing`: breadcrumbs at debug, logs at info.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, event: DiagnosticEvent) {
        let fields = Value::Object(event.fields);
        match event.kind {
            DiagnosticKind::Breadcrumb => tracing::debug!(
                source = %event.source,
                fields = %fields,
                "{}",
                event.message
            ),
            DiagnosticKind::Log => tracing::info!(
                source = %event.source,
                fields = %fields,
                "{}",
                event.message
            ),
        }
    }
}

/// Publish/subscribe sink backed by [`tokio::sync::broadcast`].
///
/// Cheaply cloneable. Subscribers receive [`Arc<DiagnosticEvent>`] so the
/// payload is not cloned per subscriber. Events emitted while nobody is
/// subscribed are dropped.
#[derive(Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<Arc<DiagnosticEvent>>,
}

impl BroadcastSink {
    /// Create a sink with the given channel capacity.
    ///
    /// A subscriber lagging by more than `capacity` events receives
    /// [`broadcast::error::RecvError::Lagged`].
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all future events. Earlier events are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DiagnosticEvent>> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl DiagnosticSink for BroadcastSink {
    fn emit(&self, event: DiagnosticEvent) {
        match self.sender.send(Arc::new(event)) {
            Ok(n) => tracing::trace!(receivers = n, "diagnostic event broadcast"),
            Err(_) => tracing::trace!("diagnostic event dropped, no subscribers"),
        }
    }
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// A sink paired with the `source` tag stamped on every event.
#[derive(Clone)]
pub struct Diagnostics {
    sink: Arc<dyn DiagnosticSink>,
    source: String,
}

impl Diagnostics {
    pub fn new(sink: Arc<dyn DiagnosticSink>, source: impl Into<String>) -> Self {
        Self {
            sink,
            source: source.into(),
        }
    }

    /// Diagnostics that go nowhere.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopSink), DEFAULT_SOURCE)
    }

    pub fn emit(&self, event: DiagnosticEvent) {
        self.sink.emit(event.with_source(&self.source));
    }

    pub fn breadcrumb(&self, message: &str) {
        self.emit(DiagnosticEvent::breadcrumb(message));
    }

    pub fn log(&self, message: &str) {
        self.emit(DiagnosticEvent::log(message));
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::disabled()
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_sink_delivers_to_subscriber() {
        let sink = BroadcastSink::new(16);
        let mut rx = sink.subscribe();

        sink.emit(DiagnosticEvent::breadcrumb("polling"));

        let event = rx.recv().await.expect("should receive event");
        assert_eq!(event.kind, DiagnosticKind::Breadcrumb);
        assert_eq!(event.message, "polling");
        assert_eq!(event.source, DEFAULT_SOURCE);
    }

    #[tokio::test]
    async fn broadcast_sink_shares_payload_between_subscribers() {
        let sink = BroadcastSink::new(16);
        let mut rx1 = sink.subscribe();
        let mut rx2 = sink.subscribe();
        assert_eq!(sink.subscriber_count(), 2);

        sink.emit(DiagnosticEvent::log("popup closed"));

        let e1 = rx1.recv().await.expect("rx1");
        let e2 = rx2.recv().await.expect("rx2");
        assert!(Arc::ptr_eq(&e1, &e2));
    }

    #[test]
    fn broadcast_sink_without_subscribers_is_silent() {
        let sink = BroadcastSink::new(4);
        sink.emit(DiagnosticEvent::log("nobody listening"));
        assert_eq!(sink.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn diagnostics_stamps_source() {
        let sink = BroadcastSink::new(8);
        let mut rx = sink.subscribe();
        let diagnostics = Diagnostics::new(Arc::new(sink), "robin");

        diagnostics.breadcrumb("started");

        let event = rx.recv().await.unwrap();
        assert_eq!(event.source, "robin");
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = DiagnosticEvent::breadcrumb("redirect detected")
            .with_field("error", "access_denied");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "SSO_BREADCRUMB");
        assert_eq!(json["message"], "redirect detected");
        assert_eq!(json["source"], "popauth");
        assert_eq!(json["fields"]["error"], "access_denied");
    }

    #[test]
    fn event_without_fields_omits_them() {
        let json = serde_json::to_value(DiagnosticEvent::log("done")).unwrap();
        assert_eq!(json["type"], "SSO_LOG");
        assert!(json.get("fields").is_none());
    }

    #[test]
    fn noop_and_tracing_sinks_accept_events() {
        NoopSink.emit(DiagnosticEvent::log("ignored"));
        TracingSink.emit(DiagnosticEvent::breadcrumb("traced").with_field("tick", 5));
    }

    #[test]
    fn sinks_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NoopSink>();
        assert_send_sync::<TracingSink>();
        assert_send_sync::<BroadcastSink>();
        assert_send_sync::<Diagnostics>();
    }
}
