// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session lifecycle tests against a scripted transport.
//!
//! Timer-driven tests run with paused time, so reconnect delays elapse
//! instantly once every task is idle.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::runtime::Handle;

use ua_session::certificate::thumbprint;
use ua_session::client::{
    ConnectRequest, Session, SessionOptions, SessionRegistry, SessionTransport, StatusSink,
    TransportFactory,
};
use ua_session::{
    ClientSettings, ConnectionState, EndpointDescription, OpcUaError, OpcUaResult,
    SecurityConfig, SecurityMode, SecurityPolicy, ServerStatus, UserTokenKind,
};

const SERVER_URL: &str = "opc.tcp://plc:4840";
const SERVER_DER: &[u8] = include_bytes!("fixtures/server_cert.der");
const RECONNECT: Duration = Duration::from_secs(1);

// =============================================================================
// Scripted Transport
// =============================================================================

enum Step {
    Succeed,
    Fail(&'static str),
    SucceedAfter(Duration),
    Hang,
}

#[derive(Default)]
struct MockTransport {
    script: Mutex<VecDeque<Step>>,
    endpoints: Mutex<Vec<EndpointDescription>>,
    sink: Mutex<Option<StatusSink>>,
    last_request: Mutex<Option<ConnectRequest>>,
    connects: AtomicUsize,
    discoveries: AtomicUsize,
    disconnects: AtomicUsize,
    disconnect_delay: Mutex<Option<Duration>>,
}

impl MockTransport {
    fn scripted(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        let mock = Arc::new(Self::default());
        mock.script.lock().extend(steps);
        mock
    }

    fn with_endpoints(self: Arc<Self>, endpoints: Vec<EndpointDescription>) -> Arc<Self> {
        *self.endpoints.lock() = endpoints;
        self
    }

    fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    fn report(&self, status: ServerStatus) {
        let sink = self.sink.lock().clone();
        sink.expect("no connection to report on").report(status);
    }
}

#[async_trait]
impl SessionTransport for MockTransport {
    async fn get_endpoints(&self, _url: &str) -> OpcUaResult<Vec<EndpointDescription>> {
        self.discoveries.fetch_add(1, Ordering::SeqCst);
        Ok(self.endpoints.lock().clone())
    }

    async fn connect(&self, request: ConnectRequest, status: StatusSink) -> OpcUaResult<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let target = request.target_url().to_string();
        *self.last_request.lock() = Some(request);

        let step = self.script.lock().pop_front().unwrap_or(Step::Succeed);
        match step {
            Step::Succeed => {}
            Step::Fail(reason) => return Err(OpcUaError::connect_failed(target, reason)),
            Step::SucceedAfter(delay) => tokio::time::sleep(delay).await,
            Step::Hang => std::future::pending::<()>().await,
        }
        *self.sink.lock() = Some(status);
        Ok(())
    }

    async fn disconnect(&self) -> OpcUaResult<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        let delay = *self.disconnect_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.sink.lock().take();
        Ok(())
    }

    fn display_name(&self) -> String {
        "mock".into()
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn settings() -> Arc<ClientSettings> {
    Arc::new(ClientSettings {
        reconnect_interval: RECONNECT,
        connect_timeout: Duration::from_secs(2),
        ..ClientSettings::default()
    })
}

fn session_with(
    mock: &Arc<MockTransport>,
    security: Arc<SecurityConfig>,
    auto_connect: bool,
) -> Session {
    Session::new(
        "plc1",
        SERVER_URL,
        SessionOptions::new(auto_connect, 0),
        security,
        settings(),
        Arc::clone(mock) as Arc<dyn SessionTransport>,
        Handle::current(),
    )
}

fn session(mock: &Arc<MockTransport>, auto_connect: bool) -> Session {
    session_with(mock, SecurityConfig::unsecured("test"), auto_connect)
}

async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..50 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

fn secured_endpoint(level: u8) -> EndpointDescription {
    EndpointDescription::new(
        SERVER_URL,
        SecurityMode::SignAndEncrypt,
        SecurityPolicy::Basic256Sha256,
        level,
    )
    .with_server_certificate(SERVER_DER.to_vec())
}

fn pki_security(base: &Path, rejected: &Path) -> Arc<SecurityConfig> {
    SecurityConfig::builder("test")
        .setup_pki(base)
        .save_rejected(Some(rejected.to_path_buf()))
        .build()
}

// =============================================================================
// Connect
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_unsecured_connect_skips_discovery() {
    let mock = MockTransport::scripted([]);
    let session = session(&mock, false);

    session.connect().unwrap();
    assert!(wait_until(|| session.is_connected()).await);

    assert_eq!(mock.connects(), 1);
    assert_eq!(mock.discoveries.load(Ordering::SeqCst), 0);
    assert!(session.endpoint_in_use().is_none());
    assert!(session.last_connected().is_some());
    assert_eq!(session.server_status(), ServerStatus::Connected);

    let request = mock.last_request.lock().clone().unwrap();
    assert!(request.endpoint.is_none());
    assert_eq!(request.target_url(), SERVER_URL);
    assert_eq!(request.identity.kind(), UserTokenKind::Anonymous);
}

#[tokio::test]
async fn test_non_opc_tcp_url_rejected() {
    let mock = MockTransport::scripted([]);
    let session = Session::new(
        "web",
        "http://plc:80",
        SessionOptions::new(true, 0),
        SecurityConfig::unsecured("test"),
        settings(),
        Arc::clone(&mock) as Arc<dyn SessionTransport>,
        Handle::current(),
    );

    assert!(session.connect().is_err());
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(!session.reconnect_pending());
    assert_eq!(mock.connects(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_connect_while_connecting_is_ignored() {
    let mock = MockTransport::scripted([Step::SucceedAfter(Duration::from_millis(100))]);
    let session = session(&mock, false);

    session.connect().unwrap();
    assert_eq!(session.state(), ConnectionState::Connecting);
    session.connect().unwrap();

    assert!(wait_until(|| session.is_connected()).await);
    session.connect().unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(mock.connects(), 1);
    assert_eq!(session.stats().connect_attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout_fails_attempt() {
    let mock = MockTransport::scripted([Step::Hang]);
    let session = session(&mock, false);

    session.connect().unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(session.last_error().unwrap().contains("timed out"));
    assert_eq!(session.stats().connect_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_status_changes_published() {
    let mock = MockTransport::scripted([]);
    let session = session(&mock, false);
    let mut changes = session.subscribe();

    session.connect().unwrap();

    let first = changes.recv().await.unwrap();
    assert_eq!(first.session, "plc1");
    assert_eq!(first.previous, ConnectionState::Disconnected);
    assert_eq!(first.current, ConnectionState::Connecting);

    let second = changes.recv().await.unwrap();
    assert_eq!(second.previous, ConnectionState::Connecting);
    assert_eq!(second.current, ConnectionState::Connected);
    assert_eq!(second.server_status, ServerStatus::Connected);
}

// =============================================================================
// Reconnect
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_failed_connect_retries_after_fixed_delay() {
    let mock = MockTransport::scripted([Step::Fail("refused"), Step::Fail("refused")]);
    let session = session(&mock, true);

    session.connect().unwrap();
    assert!(wait_until(|| session.reconnect_pending()).await);
    assert_eq!(mock.connects(), 1);
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(session.last_error().unwrap().contains("refused"));

    // first retry fails too, second one connects
    tokio::time::sleep(RECONNECT / 2).await;
    assert_eq!(mock.connects(), 1);
    tokio::time::sleep(RECONNECT).await;
    assert_eq!(mock.connects(), 2);

    tokio::time::sleep(RECONNECT * 2).await;
    assert!(session.is_connected());
    assert_eq!(mock.connects(), 3);
    assert!(!session.reconnect_pending());

    let stats = session.stats();
    assert_eq!(stats.connect_failures, 2);
    assert_eq!(stats.connect_successes, 1);
    assert_eq!(stats.reconnects, 2);
}

#[tokio::test(start_paused = true)]
async fn test_no_retry_without_autoconnect() {
    let mock = MockTransport::scripted([Step::Fail("refused")]);
    let session = session(&mock, false);

    session.connect().unwrap();
    assert!(wait_until(|| session.stats().connect_failures == 1).await);

    tokio::time::sleep(RECONNECT * 10).await;
    assert_eq!(mock.connects(), 1);
    assert!(!session.reconnect_pending());
    assert_eq!(session.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_disabling_autoconnect_disarms_timer() {
    let mock = MockTransport::scripted([Step::Fail("refused")]);
    let session = session(&mock, true);

    session.connect().unwrap();
    assert!(wait_until(|| session.reconnect_pending()).await);

    session.set_option("autoconnect", "n").unwrap();
    assert!(!session.reconnect_pending());

    tokio::time::sleep(RECONNECT * 5).await;
    assert_eq!(mock.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_drop_cancels_pending_reconnect() {
    let mock = MockTransport::scripted([Step::Fail("refused")]);
    let session = session(&mock, true);

    session.connect().unwrap();
    assert!(wait_until(|| session.reconnect_pending()).await);
    drop(session);

    tokio::time::sleep(RECONNECT * 5).await;
    assert_eq!(mock.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connection_loss_rearms_timer() {
    let mock = MockTransport::scripted([]);
    let session = session(&mock, true);

    session.connect().unwrap();
    assert!(wait_until(|| session.is_connected()).await);

    mock.report(ServerStatus::ConnectionWarningWatchdogTimeout);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(session.is_connected());
    assert!(!session.reconnect_pending());

    mock.report(ServerStatus::ConnectionErrorApiReconnect);
    assert!(wait_until(|| !session.is_connected()).await);
    assert!(session.reconnect_pending());
    assert_eq!(session.stats().connection_losses, 1);

    tokio::time::sleep(RECONNECT * 2).await;
    assert!(session.is_connected());
    assert_eq!(mock.connects(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_releases_lost_connection() {
    let mock = MockTransport::scripted([]);
    let session = session(&mock, true);

    session.connect().unwrap();
    assert!(wait_until(|| session.is_connected()).await);
    let released = mock.disconnects();

    mock.report(ServerStatus::ConnectionErrorApiReconnect);
    assert!(wait_until(|| !session.is_connected()).await);
    assert_eq!(mock.disconnects(), released);

    tokio::time::sleep(RECONNECT * 2).await;
    assert!(session.is_connected());
    assert_eq!(mock.connects(), 2);
    assert_eq!(mock.disconnects(), released + 1);
}

// =============================================================================
// Disconnect
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_disconnect_waits_for_attempt_and_discards_it() {
    let mock = MockTransport::scripted([Step::SucceedAfter(Duration::from_millis(200))]);
    let session = session(&mock, true);

    session.connect().unwrap();
    session.disconnect().await;

    assert_eq!(mock.connects(), 1);
    // one release before the connect, one from disconnect
    assert_eq!(mock.disconnects(), 2);
    assert_eq!(session.state(), ConnectionState::Disconnected);

    tokio::time::sleep(RECONNECT * 3).await;
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(!session.reconnect_pending());
    assert_eq!(mock.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_after_connect() {
    let mock = MockTransport::scripted([]);
    let session = session(&mock, true);

    session.connect().unwrap();
    assert!(wait_until(|| session.is_connected()).await);

    session.disconnect().await;
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert_eq!(session.server_status(), ServerStatus::Disconnected);

    session.connect().unwrap();
    assert!(wait_until(|| session.is_connected()).await);
    assert_eq!(mock.connects(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_drains_queued_status() {
    let mock = MockTransport::scripted([]);
    let session = session(&mock, true);

    session.connect().unwrap();
    assert!(wait_until(|| session.is_connected()).await);

    mock.report(ServerStatus::ConnectionErrorApiReconnect);
    session.disconnect().await;

    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert_eq!(session.server_status(), ServerStatus::Disconnected);
    assert!(!session.reconnect_pending());
    assert_eq!(session.stats().connection_losses, 0);

    tokio::time::sleep(RECONNECT * 3).await;
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert_eq!(mock.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_during_disconnect_is_ignored() {
    let mock = MockTransport::scripted([]);
    let session = Arc::new(session(&mock, true));

    session.connect().unwrap();
    assert!(wait_until(|| session.is_connected()).await);

    *mock.disconnect_delay.lock() = Some(Duration::from_millis(100));
    let closing = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.disconnect().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(mock.disconnects(), 2);

    session.connect().unwrap();
    closing.await.unwrap();

    assert_eq!(session.state(), ConnectionState::Disconnected);
    tokio::time::sleep(RECONNECT * 3).await;
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(!session.reconnect_pending());
    assert_eq!(mock.connects(), 1);
}

// =============================================================================
// Security
// =============================================================================

#[tokio::test]
async fn test_untrusted_certificate_rejected_and_saved() {
    let dir = tempfile::tempdir().unwrap();
    let rejected = dir.path().join("rejected");
    let mock = MockTransport::scripted([]).with_endpoints(vec![
        EndpointDescription::new(SERVER_URL, SecurityMode::None, SecurityPolicy::None, 0),
        secured_endpoint(10),
    ]);
    let session = session_with(&mock, pki_security(&dir.path().join("pki"), &rejected), false);
    session.set_option("sec-mode", "SignAndEncrypt").unwrap();

    session.connect().unwrap();
    assert!(wait_until(|| session.stats().connect_failures == 1).await);

    assert_eq!(mock.connects(), 0);
    assert!(!session.is_connected());
    assert!(session.last_error().unwrap().contains(&thumbprint(SERVER_DER)));

    let saved = rejected.join(format!("{}.der", thumbprint(SERVER_DER)));
    assert_eq!(std::fs::read(saved).unwrap(), SERVER_DER);
}

#[tokio::test]
async fn test_trusted_certificate_connects_to_best_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let pki = dir.path().join("pki");
    let trusted = pki.join("trusted").join("certs");
    std::fs::create_dir_all(&trusted).unwrap();
    std::fs::write(trusted.join("server.der"), SERVER_DER).unwrap();

    let mock = MockTransport::scripted([]).with_endpoints(vec![
        EndpointDescription::new(SERVER_URL, SecurityMode::None, SecurityPolicy::None, 0),
        secured_endpoint(5),
        secured_endpoint(10),
    ]);
    let session = session_with(&mock, pki_security(&pki, &dir.path().join("rejected")), false);
    session.set_option("sec-level", "1").unwrap();

    session.connect().unwrap();
    assert!(wait_until(|| session.is_connected()).await);

    let endpoint = session.endpoint_in_use().unwrap();
    assert_eq!(endpoint.security_level, 10);
    assert_eq!(session.endpoints().len(), 3);
    assert!(session.show(0).contains("sec-mode=SignAndEncrypt(any)"));

    let report = session.show_security().await.unwrap();
    let in_use = report.in_use().unwrap();
    assert_eq!(in_use.index, 2);
    assert!(in_use.trusted);
    assert!(in_use.certificate.is_some());
}

#[tokio::test]
async fn test_no_matching_endpoint_fails_attempt() {
    let mock = MockTransport::scripted([]).with_endpoints(vec![EndpointDescription::new(
        SERVER_URL,
        SecurityMode::None,
        SecurityPolicy::None,
        0,
    )]);
    let session = session(&mock, false);
    session.set_option("sec-mode", "Sign").unwrap();

    session.connect().unwrap();
    assert!(wait_until(|| session.stats().connect_failures == 1).await);

    assert_eq!(mock.connects(), 0);
    assert!(session.last_error().unwrap().contains("No endpoint"));
}

#[tokio::test]
async fn test_identity_file_checked_against_endpoint_tokens() {
    let dir = tempfile::tempdir().unwrap();
    let ident = dir.path().join("ident");
    std::fs::write(&ident, "user=operator\npass=secret\n").unwrap();

    let mock = MockTransport::scripted([]).with_endpoints(vec![EndpointDescription::new(
        SERVER_URL,
        SecurityMode::None,
        SecurityPolicy::None,
        0,
    )
    .with_user_tokens(vec![UserTokenKind::Anonymous])]);
    let session = session(&mock, false);
    session.set_option("sec-mode", "None").unwrap();
    session
        .set_option("ident-file", ident.to_str().unwrap())
        .unwrap();

    session.connect().unwrap();
    assert!(wait_until(|| session.stats().connect_failures == 1).await);
    assert_eq!(mock.connects(), 0);

    mock.endpoints.lock()[0] = EndpointDescription::new(
        SERVER_URL,
        SecurityMode::None,
        SecurityPolicy::None,
        0,
    )
    .with_user_tokens(vec![UserTokenKind::Anonymous, UserTokenKind::UserName]);

    session.connect().unwrap();
    assert!(wait_until(|| session.is_connected()).await);
    let request = mock.last_request.lock().clone().unwrap();
    assert_eq!(request.identity.kind(), UserTokenKind::UserName);
}

#[tokio::test]
async fn test_missing_identity_file_fails_attempt() {
    let mock = MockTransport::scripted([]);
    let session = session(&mock, false);
    session
        .set_option("ident-file", "/nonexistent/ua-session/ident")
        .unwrap();

    session.connect().unwrap();
    assert!(wait_until(|| session.stats().connect_failures == 1).await);
    assert_eq!(mock.connects(), 0);
}

// =============================================================================
// Registry
// =============================================================================

fn registry(mock: &Arc<MockTransport>) -> SessionRegistry {
    let mock = Arc::clone(mock);
    let factory: Arc<dyn TransportFactory> = Arc::new(move |_: &str, _: &str| {
        Arc::clone(&mock) as Arc<dyn SessionTransport>
    });
    SessionRegistry::with_current_runtime(
        SecurityConfig::unsecured("test"),
        ClientSettings::default(),
        factory,
    )
}

#[tokio::test(start_paused = true)]
async fn test_registry_lookup_and_duplicates() {
    let mock = MockTransport::scripted([]);
    let registry = registry(&mock);

    registry.create_session("a", SERVER_URL, 0, true).unwrap();
    registry.create_session("b", SERVER_URL, 0, false).unwrap();

    let err = registry.create_session("a", SERVER_URL, 0, false).unwrap_err();
    assert!(err.to_string().contains("'a'"));
    assert!(registry.find_session("c").is_err());
    assert!(registry.session_exists("b"));
    assert_eq!(registry.len(), 2);

    let names: Vec<_> = registry.sessions().iter().map(|s| s.name().to_string()).collect();
    assert_eq!(names, ["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn test_registry_autoconnect_and_show_all() {
    let mock = MockTransport::scripted([]);
    let registry = registry(&mock);

    registry.create_session("a", SERVER_URL, 0, true).unwrap();
    registry.create_session("b", SERVER_URL, 0, false).unwrap();
    assert_eq!(
        registry.show_all(0),
        "OPC UA: total of 2 session(s) (0 connected)"
    );

    registry.connect_auto_sessions();
    let a = registry.find_session("a").unwrap();
    assert!(wait_until(|| a.is_connected()).await);
    assert!(!registry.find_session("b").unwrap().is_connected());

    let text = registry.show_all(1);
    assert!(text.starts_with("OPC UA: total of 2 session(s) (1 connected)"));
    assert!(text.contains("session=a"));
    assert!(text.contains("session=b"));
    assert!(text.contains("autoconnect=y"));

    registry.disconnect_all().await;
    assert!(!a.is_connected());
}
