//! Integration tests for the popauth-engine crate.
//!
//! These drive a scripted browser through the public API: a popup that
//! starts on the provider's page, navigates, and is eventually redirected or
//! closed, all on tokio's paused clock.

use std::sync::{Arc, Once};
use std::time::Duration;

use popauth_engine::testing::{FakeOpener, FakeWindow};
use popauth_engine::{
    BroadcastSink, DiagnosticKind, HostEnvironment, NavigationEvent, PopupConfig, PopupError,
    PopupLauncher, PopupOptions,
};
use tracing_subscriber::EnvFilter;

const AUTHORIZE: &str = "https://idp.example.com/authorize?client_id=app";
const REDIRECT: &str = "https://app.example.com/cb";

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_test_writer()
            .compact()
            .init();
    });
}

// ═══════════════════════════════════════════════════════════════════════
//  Scripted browser
// ═══════════════════════════════════════════════════════════════════════

fn desktop_launcher(popup: &FakeWindow) -> PopupLauncher {
    init_tracing();
    let browser = FakeOpener::new(HostEnvironment::default(), Some(popup.clone()));
    PopupLauncher::new(Arc::new(browser), PopupConfig::default()).unwrap()
}

fn webview_launcher(popup: &FakeWindow) -> PopupLauncher {
    init_tracing();
    let env = HostEnvironment {
        wrapped_container: true,
        ..HostEnvironment::default()
    };
    let browser = FakeOpener::new(env, Some(popup.clone()));
    PopupLauncher::new(Arc::new(browser), PopupConfig::default()).unwrap()
}

/// Run `script` against the popup after `delay` of virtual time.
fn after(delay: Duration, script: impl FnOnce() + Send + 'static) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        script();
    });
}

// ═══════════════════════════════════════════════════════════════════════
//  Polling detector
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn polling_resolves_code_after_provider_pages() {
    let popup = FakeWindow::cross_origin();
    let launcher = desktop_launcher(&popup);

    let p = popup.clone();
    after(Duration::from_millis(1_250), move || {
        p.set_location("https://app.example.com/cb?code=abc123");
    });

    let params = launcher
        .open(AUTHORIZE, "idp", PopupOptions::default(), REDIRECT)
        .await
        .unwrap();

    assert_eq!(params.get("code"), Some("abc123"));
    assert_eq!(params.len(), 1);
    assert_eq!(popup.close_calls(), 1);
    // Ticks at 500 and 1000 hit cross-origin reads; 1500 sees the redirect.
    assert_eq!(popup.location_reads(), 3);
}

#[tokio::test(start_paused = true)]
async fn polling_resolves_fragment_token() {
    let popup = FakeWindow::cross_origin();
    popup.set_location("https://app.example.com/cb#access_token=xyz&state=1");

    let params = desktop_launcher(&popup)
        .open(AUTHORIZE, "idp", PopupOptions::default(), REDIRECT)
        .await
        .unwrap();

    assert_eq!(params.get("access_token"), Some("xyz"));
    assert_eq!(params.get("state"), Some("1"));
    assert_eq!(params.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn polling_rejects_provider_error() {
    let popup = FakeWindow::cross_origin();
    popup.set_location("https://app.example.com/cb?error=access_denied");

    let err = desktop_launcher(&popup)
        .open(AUTHORIZE, "idp", PopupOptions::default(), REDIRECT)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "access_denied");
    assert_eq!(popup.close_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn polling_fragment_wins_over_query() {
    let popup = FakeWindow::cross_origin();
    popup.set_location("https://app.example.com/cb?state=from_query&code=c#state=from_fragment");

    let params = desktop_launcher(&popup)
        .open(AUTHORIZE, "idp", PopupOptions::default(), REDIRECT)
        .await
        .unwrap();

    assert_eq!(params.get("state"), Some("from_fragment"));
    assert_eq!(params.get("code"), Some("c"));
}

#[tokio::test(start_paused = true)]
async fn polling_ignores_same_origin_non_redirect_paths() {
    let popup = FakeWindow::cross_origin();
    popup.set_location("https://app.example.com/login?code=not_yet");
    let launcher = desktop_launcher(&popup);

    let p = popup.clone();
    after(Duration::from_secs(3), move || {
        p.set_location("https://app.example.com/cb?code=real");
    });

    let params = launcher
        .open(AUTHORIZE, "idp", PopupOptions::default(), REDIRECT)
        .await
        .unwrap();
    assert_eq!(params.get("code"), Some("real"));
}

#[tokio::test(start_paused = true)]
async fn polling_rejects_redirect_without_params() {
    let popup = FakeWindow::cross_origin();
    popup.set_location(REDIRECT);

    let err = desktop_launcher(&popup)
        .open(AUTHORIZE, "idp", PopupOptions::default(), REDIRECT)
        .await
        .unwrap_err();

    assert!(matches!(err, PopupError::MissingRedirectParams));
    assert_eq!(popup.close_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn polling_user_close_rejects_and_stops_ticking() {
    let popup = FakeWindow::cross_origin();
    let launcher = desktop_launcher(&popup);

    let p = popup.clone();
    after(Duration::from_millis(2_100), move || p.set_closed(Some(true)));

    let err = launcher
        .open(AUTHORIZE, "idp", PopupOptions::default(), REDIRECT)
        .await
        .unwrap_err();
    assert!(matches!(err, PopupError::PopupClosedByUser));

    let checks = popup.closed_checks();
    let reads = popup.location_reads();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(popup.closed_checks(), checks);
    assert_eq!(popup.location_reads(), reads);
    // The user closed it; the engine never did.
    assert_eq!(popup.close_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn polling_close_wins_over_simultaneous_redirect() {
    let popup = FakeWindow::cross_origin();
    let launcher = desktop_launcher(&popup);

    let p = popup.clone();
    after(Duration::from_millis(700), move || {
        p.set_location("https://app.example.com/cb?code=abc");
        p.set_closed(Some(true));
    });

    let err = launcher
        .open(AUTHORIZE, "idp", PopupOptions::default(), REDIRECT)
        .await
        .unwrap_err();
    assert!(matches!(err, PopupError::PopupClosedByUser));
    // Only the first tick (at 500 ms) read the location.
    assert_eq!(popup.location_reads(), 1);
}

#[tokio::test(start_paused = true)]
async fn polling_respects_configured_timeout() {
    init_tracing();
    let popup = FakeWindow::cross_origin();
    let browser = FakeOpener::new(HostEnvironment::default(), Some(popup.clone()));
    let config = PopupConfig::from_toml_str("timeout_secs = 5\npoll_interval_ms = 250").unwrap();
    let launcher = PopupLauncher::new(Arc::new(browser), config).unwrap();

    let err = launcher
        .open(AUTHORIZE, "idp", PopupOptions::default(), REDIRECT)
        .await
        .unwrap_err();

    assert!(matches!(err, PopupError::WaitTimeout { timeout_ms: 5_000 }));
    assert_eq!(popup.close_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn polling_emits_start_heartbeat_and_close_diagnostics() {
    let popup = FakeWindow::cross_origin();
    let sink = BroadcastSink::new(256);
    let mut rx = sink.subscribe();
    let launcher = desktop_launcher(&popup).with_sink(Arc::new(sink));

    let p = popup.clone();
    after(Duration::from_millis(3_200), move || p.set_closed(Some(true)));

    launcher
        .open(AUTHORIZE, "idp", PopupOptions::default(), REDIRECT)
        .await
        .unwrap_err();

    let mut messages = Vec::new();
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.source, "popauth");
        messages.push((event.kind, event.message.clone()));
    }

    assert!(messages.contains(&(DiagnosticKind::Breadcrumb, "Starting poll.".to_string())));
    let heartbeats = messages.iter().filter(|(_, m)| m == "Polling.").count();
    // Ticks 0..=6 ran (500 ms .. 3500 ms); heartbeats on ticks 0 and 5.
    assert_eq!(heartbeats, 2);
    assert!(messages.contains(&(DiagnosticKind::Log, "Popup window was closed.".to_string())));
}

#[tokio::test(start_paused = true)]
async fn concurrent_waits_are_isolated() {
    let first = FakeWindow::cross_origin();
    let second = FakeWindow::cross_origin();
    let first_launcher = desktop_launcher(&first);
    let second_launcher = desktop_launcher(&second);

    let (f, s) = (first.clone(), second.clone());
    after(Duration::from_millis(900), move || {
        f.set_location("https://app.example.com/cb?code=one");
        s.set_closed(Some(true));
    });

    let (a, b) = tokio::join!(
        first_launcher.open(AUTHORIZE, "a", PopupOptions::default(), REDIRECT),
        second_launcher.open(AUTHORIZE, "b", PopupOptions::default(), REDIRECT),
    );

    assert_eq!(a.unwrap().get("code"), Some("one"));
    assert!(matches!(b, Err(PopupError::PopupClosedByUser)));
    assert_eq!(first.close_calls(), 1);
    assert_eq!(second.close_calls(), 0);
}

// ═══════════════════════════════════════════════════════════════════════
//  Event-driven detector
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn events_skip_provider_pages_then_resolve() {
    let (popup, tx) = FakeWindow::with_events();
    let launcher = webview_launcher(&popup);

    tx.send(NavigationEvent::Started {
        url: "https://idp.example.com/login".into(),
    })
    .unwrap();
    tx.send(NavigationEvent::Started {
        url: "https://idp.example.com/consent?scope=openid".into(),
    })
    .unwrap();
    tx.send(NavigationEvent::Started {
        url: "https://app.example.com/cb?code=abc123&state=s".into(),
    })
    .unwrap();

    let params = launcher
        .open(AUTHORIZE, "idp", PopupOptions::default(), REDIRECT)
        .await
        .unwrap();

    assert_eq!(params.get("code"), Some("abc123"));
    assert_eq!(params.get("state"), Some("s"));
    assert_eq!(popup.close_calls(), 1);
    assert_eq!(popup.location_reads(), 0);
}

#[tokio::test(start_paused = true)]
async fn events_bare_redirect_keeps_waiting_until_exit() {
    let (popup, tx) = FakeWindow::with_events();
    let launcher = webview_launcher(&popup);

    tx.send(NavigationEvent::Started { url: REDIRECT.into() }).unwrap();
    tx.send(NavigationEvent::Exited).unwrap();

    let err = launcher
        .open(AUTHORIZE, "idp", PopupOptions::default(), REDIRECT)
        .await
        .unwrap_err();

    assert!(matches!(err, PopupError::PopupClosedByUser));
}

#[tokio::test(start_paused = true)]
async fn events_load_error_rejects() {
    let (popup, tx) = FakeWindow::with_events();
    let launcher = webview_launcher(&popup);

    after(Duration::from_secs(1), move || {
        tx.send(NavigationEvent::Failed {
            message: "net::ERR_CONNECTION_REFUSED".into(),
        })
        .unwrap();
    });

    let err = launcher
        .open(AUTHORIZE, "idp", PopupOptions::default(), REDIRECT)
        .await
        .unwrap_err();
    assert!(matches!(err, PopupError::AuthorizationFailed));
}

#[tokio::test(start_paused = true)]
async fn events_after_settlement_are_ignored() {
    let (popup, tx) = FakeWindow::with_events();
    let launcher = webview_launcher(&popup);

    tx.send(NavigationEvent::Started {
        url: "https://app.example.com/cb?error=access_denied".into(),
    })
    .unwrap();
    tx.send(NavigationEvent::Started {
        url: "https://app.example.com/cb?code=late".into(),
    })
    .unwrap();
    tx.send(NavigationEvent::Exited).unwrap();

    let err = launcher
        .open(AUTHORIZE, "idp", PopupOptions::default(), REDIRECT)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "access_denied");
    assert_eq!(popup.close_calls(), 1);
}

// ═══════════════════════════════════════════════════════════════════════
//  Configuration
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn sample_config_file_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("default.toml");
    std::fs::write(
        &path,
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/default.toml")),
    )
    .unwrap();

    let config = PopupConfig::load(&path).unwrap();
    assert_eq!(config.poll_interval_ms, 500);
    assert_eq!(config.heartbeat_every, 5);
    assert!(config.timeout_secs.is_none());
}
