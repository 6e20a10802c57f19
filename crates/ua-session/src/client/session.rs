// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session lifecycle.
//!
//! A [`Session`] is one named connection to one server. Its connection
//! state moves between three states:
//!
//! ```text
//!                connect()
//! Disconnected ────────────► Connecting
//!      ▲   ▲                   │    │
//!      │   └───── failure ─────┘    │ success
//!      │                            ▼
//!      └─── loss / disconnect ── Connected
//! ```
//!
//! `connect()` never blocks: it spawns one attempt task and returns. The
//! attempt's outcome, and every later status report from the transport,
//! travel through a per-session queue consumed by one event pump task, so
//! they are applied strictly in order. Every queued item and every running
//! attempt is counted; `disconnect()` waits until that count drops to zero
//! before it tears the connection down.
//!
//! Each connect and disconnect starts a new generation. Events tagged with
//! an older generation are discarded when they reach the pump.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::task::JoinHandle;

use super::options::SessionOptions;
use super::reconnect::ReconnectTimer;
use super::report::{EndpointReport, SecurityReport};
use super::transport::{ConnectRequest, SessionTransport, StatusSink};
use crate::certificate::{CertificateInfo, SecurityConfig};
use crate::endpoint::select_or_fail;
use crate::error::{ConnectionError, OpcUaError, OpcUaResult, SecurityError};
use crate::identity::{load_identity_file, IdentityToken};
use crate::settings::ClientSettings;
use crate::types::{is_opc_tcp_url, ConnectionState, EndpointDescription, ServerStatus};

const STATUS_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// StatusChange
// =============================================================================

/// Published on every connection state or server status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    /// Session name.
    pub session: String,
    /// State before the change.
    pub previous: ConnectionState,
    /// State after the change.
    pub current: ConnectionState,
    /// Last server status reported by the transport.
    pub server_status: ServerStatus,
}

// =============================================================================
// SessionStats
// =============================================================================

/// Snapshot of session counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Connect attempts started.
    pub connect_attempts: u64,
    /// Attempts that ended connected.
    pub connect_successes: u64,
    /// Attempts that failed.
    pub connect_failures: u64,
    /// Established connections lost.
    pub connection_losses: u64,
    /// Reconnect timer expiries acted upon.
    pub reconnects: u64,
}

#[derive(Debug, Default)]
struct SessionCounters {
    connect_attempts: AtomicU64,
    connect_successes: AtomicU64,
    connect_failures: AtomicU64,
    connection_losses: AtomicU64,
    reconnects: AtomicU64,
}

impl SessionCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SessionStats {
        SessionStats {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connect_successes: self.connect_successes.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            connection_losses: self.connection_losses.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// In-flight Tracking
// =============================================================================

#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    fn enter(self: &Arc<Self>) -> InFlightGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(Arc::clone(self))
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

// =============================================================================
// Event Queue
// =============================================================================

enum SessionEvent {
    AttemptFinished {
        generation: u64,
        outcome: OpcUaResult<Option<EndpointDescription>>,
    },
    ServerStatus {
        generation: u64,
        status: ServerStatus,
    },
    ReconnectDue {
        generation: u64,
    },
}

impl SessionEvent {
    fn generation(&self) -> u64 {
        match self {
            Self::AttemptFinished { generation, .. }
            | Self::ServerStatus { generation, .. }
            | Self::ReconnectDue { generation } => *generation,
        }
    }
}

struct Queued {
    event: SessionEvent,
    _guard: InFlightGuard,
}

/// State shared with the attempt task, the timer and status sinks.
struct Shared {
    generation: AtomicU64,
    in_flight: Arc<InFlight>,
    events: mpsc::UnboundedSender<Queued>,
}

impl Shared {
    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn enqueue(&self, event: SessionEvent) {
        let queued = Queued {
            event,
            _guard: self.in_flight.enter(),
        };
        // pump gone means the session is being dropped
        let _ = self.events.send(queued);
    }
}

// =============================================================================
// Session
// =============================================================================

#[derive(Debug, Default)]
struct StateData {
    connection: ConnectionState,
    server_status: ServerStatus,
    endpoint: Option<EndpointDescription>,
    last_connected: Option<DateTime<Utc>>,
    last_error: Option<String>,
    disconnecting: u32,
}

struct SessionInner {
    name: String,
    server_url: String,
    security: Arc<SecurityConfig>,
    settings: Arc<ClientSettings>,
    transport: Arc<dyn SessionTransport>,
    runtime: Handle,
    shared: Arc<Shared>,
    state: RwLock<StateData>,
    options: RwLock<SessionOptions>,
    endpoints: Arc<RwLock<Vec<EndpointDescription>>>,
    status_tx: broadcast::Sender<StatusChange>,
    timer: ReconnectTimer,
    pump: Mutex<Option<JoinHandle<()>>>,
    counters: SessionCounters,
}

/// A named connection to one OPC UA server.
///
/// Dropping the session cancels its reconnect timer and stops its event
/// pump; no connect is started after that.
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Creates a disconnected session.
    ///
    /// The event pump and all attempts run on `runtime`.
    pub fn new(
        name: impl Into<String>,
        server_url: impl Into<String>,
        options: SessionOptions,
        security: Arc<SecurityConfig>,
        settings: Arc<ClientSettings>,
        transport: Arc<dyn SessionTransport>,
        runtime: Handle,
    ) -> Self {
        let (events, receiver) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            generation: AtomicU64::new(0),
            in_flight: Arc::new(InFlight::default()),
            events,
        });

        let timer_shared = Arc::clone(&shared);
        let timer = ReconnectTimer::new(settings.reconnect_interval, runtime.clone(), move || {
            let generation = timer_shared.generation();
            timer_shared.enqueue(SessionEvent::ReconnectDue { generation });
        });

        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);

        let inner = Arc::new(SessionInner {
            name: name.into(),
            server_url: server_url.into(),
            security,
            settings,
            transport,
            runtime: runtime.clone(),
            shared,
            state: RwLock::new(StateData::default()),
            options: RwLock::new(options),
            endpoints: Arc::new(RwLock::new(Vec::new())),
            status_tx,
            timer,
            pump: Mutex::new(None),
            counters: SessionCounters::default(),
        });

        let pump = runtime.spawn(run_event_pump(Arc::downgrade(&inner), receiver));
        *inner.pump.lock() = Some(pump);

        tracing::debug!(
            session = %inner.name,
            url = %inner.server_url,
            transport = %inner.transport.display_name(),
            "Session created"
        );

        Self { inner }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the session name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the server URL.
    pub fn server_url(&self) -> &str {
        &self.inner.server_url
    }

    /// Returns the connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state.read().connection
    }

    /// Returns the last server status reported by the transport.
    pub fn server_status(&self) -> ServerStatus {
        self.inner.state.read().server_status
    }

    /// Returns `true` if the session is connected.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Returns the endpoint in use, `None` when unsecured or disconnected.
    pub fn endpoint_in_use(&self) -> Option<EndpointDescription> {
        self.inner.state.read().endpoint.clone()
    }

    /// Returns when the session last connected.
    pub fn last_connected(&self) -> Option<DateTime<Utc>> {
        self.inner.state.read().last_connected
    }

    /// Returns the message of the last failed attempt.
    pub fn last_error(&self) -> Option<String> {
        self.inner.state.read().last_error.clone()
    }

    /// Returns a copy of the current options.
    pub fn options(&self) -> SessionOptions {
        self.inner.options.read().clone()
    }

    /// Returns `true` if failures arm the reconnect timer.
    pub fn auto_connect(&self) -> bool {
        self.inner.options.read().auto_connect
    }

    /// Returns the debug verbosity.
    pub fn debug_level(&self) -> u32 {
        self.inner.options.read().debug_level
    }

    /// Returns the endpoints found by the last discovery.
    pub fn endpoints(&self) -> Vec<EndpointDescription> {
        self.inner.endpoints.read().clone()
    }

    /// Returns the session counters.
    pub fn stats(&self) -> SessionStats {
        self.inner.counters.snapshot()
    }

    /// Returns `true` while a reconnect is scheduled.
    pub fn reconnect_pending(&self) -> bool {
        self.inner.timer.is_pending()
    }

    /// Subscribes to status changes.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.inner.status_tx.subscribe()
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Starts connecting.
    ///
    /// Returns immediately. Only a server URL that is not `opc.tcp://` is
    /// rejected here; every other failure is reported asynchronously.
    /// Calling this while connected or connecting does nothing.
    pub fn connect(&self) -> OpcUaResult<()> {
        self.inner.connect()
    }

    /// Disconnects and waits until nothing of the session is in flight.
    ///
    /// Always ends `Disconnected`. Transport errors are logged only.
    pub async fn disconnect(&self) {
        self.inner.disconnect().await;
    }

    /// Sets one option by name.
    pub fn set_option(&self, name: &str, value: &str) -> OpcUaResult<()> {
        let inner = &self.inner;
        let auto_connect = {
            let mut options = inner.options.write();
            options.set(name, value, &inner.security)?;
            options.auto_connect
        };

        if !auto_connect {
            inner.timer.disarm();
        }
        tracing::debug!(session = %inner.name, option = name, value, "Session option set");
        Ok(())
    }

    /// Renders the session for display.
    ///
    /// Level 0 is one line; higher levels add state and endpoint details.
    pub fn show(&self, level: u32) -> String {
        let inner = &self.inner;
        let options = inner.options.read().clone();
        let state = inner.state.read();

        let (mode, policy) = match (&state.endpoint, state.connection.is_connected()) {
            (Some(ep), _) => (ep.security_mode.name(), ep.policy_name().to_string()),
            (None, true) => ("None", "None".to_string()),
            (None, false) => ("-", "-".to_string()),
        };

        let mut out = format!(
            "session={} url={} status={} sec-mode={}({}) sec-policy={}({}) sec-level={} debug={} batch={} autoconnect={}",
            inner.name,
            inner.server_url,
            state.server_status,
            mode,
            options.security.mode,
            policy,
            options.security.policy,
            options.security.min_level,
            options.debug_level,
            options.batch.max_nodes_per_call,
            if options.auto_connect { "y" } else { "n" },
        );

        if level >= 1 {
            let stats = inner.counters.snapshot();
            out.push_str(&format!(
                "\n  state={} reader={}/{}-{}ms writer={}/{}-{}ms",
                state.connection,
                options.batch.effective_read_limit(),
                options.batch.read_timeout_min,
                options.batch.read_timeout_max,
                options.batch.effective_write_limit(),
                options.batch.write_timeout_min,
                options.batch.write_timeout_max,
            ));
            out.push_str(&format!(
                "\n  attempts={} connected={} failed={} lost={} reconnects={} reconnect-pending={}",
                stats.connect_attempts,
                stats.connect_successes,
                stats.connect_failures,
                stats.connection_losses,
                stats.reconnects,
                if inner.timer.is_pending() { "y" } else { "n" },
            ));
            if let Some(at) = state.last_connected {
                out.push_str(&format!("\n  last-connect={}", at.to_rfc3339()));
            }
            if let Some(error) = &state.last_error {
                out.push_str(&format!("\n  last-error={error}"));
            }
            if let Some(file) = &options.identity_file {
                out.push_str(&format!("\n  ident-file={}", file.display()));
            }
            if let Some(ep) = &state.endpoint {
                out.push_str(&format!("\n  endpoint={ep}"));
            }
        }

        out
    }

    /// Runs discovery and reports every endpoint with its certificate and
    /// trust status.
    pub async fn show_security(&self) -> OpcUaResult<SecurityReport> {
        let inner = &self.inner;
        if !is_opc_tcp_url(&inner.server_url) {
            return Err(OpcUaError::rejected(
                &inner.name,
                format!("cannot discover '{}': not an opc.tcp URL", inner.server_url),
            ));
        }

        let discovered = inner.transport.get_endpoints(&inner.server_url).await?;
        *inner.endpoints.write() = discovered.clone();

        let (connected, in_use) = {
            let state = inner.state.read();
            (state.connection.is_connected(), state.endpoint.clone())
        };

        let mut endpoints = Vec::new();
        for (index, endpoint) in discovered.into_iter().enumerate() {
            if !endpoint.is_opc_tcp() {
                continue;
            }

            let active = connected
                && match &in_use {
                    Some(used) => {
                        used.endpoint_url == endpoint.endpoint_url
                            && used.security_mode == endpoint.security_mode
                            && used.security_policy_uri == endpoint.security_policy_uri
                            && used.security_level == endpoint.security_level
                    }
                    None => endpoint.security_mode.is_none(),
                };

            let (certificate, trusted) = if endpoint.server_certificate.is_empty() {
                (None, false)
            } else {
                let info = CertificateInfo::from_der(&endpoint.server_certificate).ok();
                let trusted = inner.security.is_trusted(&endpoint.server_certificate).await;
                (info, trusted)
            };

            endpoints.push(EndpointReport {
                index,
                endpoint,
                in_use: active,
                certificate,
                trusted,
            });
        }

        Ok(SecurityReport {
            session: inner.name.clone(),
            discovery_url: inner.server_url.clone(),
            requested: inner.options.read().security,
            endpoints,
        })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.inner.name)
            .field("url", &self.inner.server_url)
            .field("state", &self.state())
            .finish()
    }
}

// =============================================================================
// Session Internals
// =============================================================================

impl SessionInner {
    fn connect(&self) -> OpcUaResult<()> {
        if !is_opc_tcp_url(&self.server_url) {
            return Err(OpcUaError::rejected(
                &self.name,
                format!("only opc.tcp:// URLs are supported, got '{}'", self.server_url),
            ));
        }

        {
            let mut state = self.state.write();
            if state.disconnecting > 0 {
                tracing::debug!(session = %self.name, "Disconnect in progress, connect ignored");
                return Ok(());
            }
            match state.connection {
                ConnectionState::Connected => {
                    tracing::debug!(session = %self.name, status = %state.server_status, "Already connected");
                    return Ok(());
                }
                ConnectionState::Connecting => {
                    tracing::debug!(session = %self.name, "Connect already in progress");
                    return Ok(());
                }
                ConnectionState::Disconnected => state.connection = ConnectionState::Connecting,
            }
        }

        self.timer.disarm();
        let generation = self.shared.next_generation();
        SessionCounters::bump(&self.counters.connect_attempts);
        self.publish(ConnectionState::Disconnected);

        let options = self.options.read().clone();
        let sink_shared = Arc::clone(&self.shared);
        let attempt = ConnectAttempt {
            session: self.name.clone(),
            server_url: self.server_url.clone(),
            options,
            transport: Arc::clone(&self.transport),
            security: Arc::clone(&self.security),
            settings: Arc::clone(&self.settings),
            endpoints: Arc::clone(&self.endpoints),
            sink: StatusSink::new(move |status| {
                sink_shared.enqueue(SessionEvent::ServerStatus { generation, status });
            }),
        };

        tracing::debug!(session = %self.name, url = %self.server_url, generation, "Connect attempt started");

        let guard = self.shared.in_flight.enter();
        let shared = Arc::clone(&self.shared);
        self.runtime.spawn(async move {
            let outcome = attempt.run().await;
            let _ = shared.events.send(Queued {
                event: SessionEvent::AttemptFinished {
                    generation,
                    outcome,
                },
                _guard: guard,
            });
        });

        Ok(())
    }

    async fn disconnect(&self) {
        self.state.write().disconnecting += 1;
        self.timer.disarm();
        self.shared.next_generation();
        self.shared.in_flight.wait_idle().await;

        match self.transport.disconnect().await {
            Ok(()) => tracing::debug!(session = %self.name, "Disconnect service ok"),
            Err(e) => e.log(&format!("session {} disconnect", self.name)),
        }

        let previous = {
            let mut state = self.state.write();
            let previous = state.connection;
            state.connection = ConnectionState::Disconnected;
            state.server_status = ServerStatus::Disconnected;
            state.endpoint = None;
            state.disconnecting -= 1;
            previous
        };

        if previous != ConnectionState::Disconnected {
            tracing::info!(session = %self.name, "Session disconnected");
            self.publish(previous);
        }
    }

    async fn handle_event(&self, event: SessionEvent) {
        let current = self.shared.generation();
        if event.generation() != current {
            tracing::trace!(
                session = %self.name,
                generation = event.generation(),
                current,
                "Discarding stale session event"
            );
            return;
        }

        match event {
            SessionEvent::AttemptFinished { outcome, .. } => self.finish_attempt(outcome).await,
            SessionEvent::ServerStatus { status, .. } => self.apply_server_status(status),
            SessionEvent::ReconnectDue { .. } => {
                SessionCounters::bump(&self.counters.reconnects);
                tracing::debug!(session = %self.name, "Reconnect timer expired");
                if let Err(e) = self.connect() {
                    e.log(&format!("session {} reconnect", self.name));
                }
            }
        }
    }

    async fn finish_attempt(&self, outcome: OpcUaResult<Option<EndpointDescription>>) {
        match outcome {
            Ok(endpoint) => {
                match &endpoint {
                    Some(ep) if !ep.security_mode.is_none() => tracing::info!(
                        session = %self.name,
                        level = ep.security_level,
                        mode = %ep.security_mode,
                        policy = ep.policy_name(),
                        "Connect service succeeded with security"
                    ),
                    _ => tracing::info!(session = %self.name, "Connect service succeeded with no security"),
                }

                let previous = {
                    let mut state = self.state.write();
                    let previous = state.connection;
                    state.connection = ConnectionState::Connected;
                    state.server_status = ServerStatus::Connected;
                    state.endpoint = endpoint;
                    state.last_connected = Some(Utc::now());
                    state.last_error = None;
                    previous
                };
                SessionCounters::bump(&self.counters.connect_successes);
                self.publish(previous);
            }
            Err(error) => {
                let (auto_connect, debug_level) = {
                    let options = self.options.read();
                    (options.auto_connect, options.debug_level)
                };

                if !auto_connect || debug_level > 0 {
                    error.log(&format!("session {} connect", self.name));
                } else {
                    tracing::debug!(session = %self.name, error = %error, "Connect attempt failed");
                }

                if let Some(der) = error.rejected_certificate() {
                    self.security.save_rejected_certificate(der).await;
                }

                let previous = {
                    let mut state = self.state.write();
                    let previous = state.connection;
                    state.connection = ConnectionState::Disconnected;
                    state.server_status = ServerStatus::Disconnected;
                    state.endpoint = None;
                    state.last_error = Some(error.to_string());
                    previous
                };
                SessionCounters::bump(&self.counters.connect_failures);

                if auto_connect {
                    self.timer.start();
                }
                self.publish(previous);
            }
        }
    }

    fn apply_server_status(&self, status: ServerStatus) {
        let previous = {
            let mut state = self.state.write();
            state.server_status = status;
            let previous = state.connection;

            // the attempt outcome decides while connecting
            if previous.is_connecting() {
                return;
            }
            state.connection = if status.is_connected() {
                ConnectionState::Connected
            } else {
                ConnectionState::Disconnected
            };
            if !status.is_connected() {
                state.endpoint = None;
            }
            previous
        };

        if status.is_connection_loss() && previous.is_connected() {
            SessionCounters::bump(&self.counters.connection_losses);
            tracing::warn!(session = %self.name, status = %status, "Connection lost");
            if self.options.read().auto_connect {
                self.timer.start();
            }
        } else if self.options.read().debug_level > 0 {
            tracing::info!(session = %self.name, status = %status, "Server status changed");
        } else {
            tracing::debug!(session = %self.name, status = %status, "Server status changed");
        }

        self.publish(previous);
    }

    fn publish(&self, previous: ConnectionState) {
        let (current, server_status) = {
            let state = self.state.read();
            (state.connection, state.server_status)
        };
        // no receivers is fine
        let _ = self.status_tx.send(StatusChange {
            session: self.name.clone(),
            previous,
            current,
            server_status,
        });
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.timer.cancel();
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        tracing::debug!(session = %self.name, "Session destroyed");
    }
}

async fn run_event_pump(session: Weak<SessionInner>, mut events: mpsc::UnboundedReceiver<Queued>) {
    while let Some(Queued { event, _guard }) = events.recv().await {
        let Some(inner) = session.upgrade() else {
            break;
        };
        inner.handle_event(event).await;
        drop(inner);
        drop(_guard);
    }
}

// =============================================================================
// ConnectAttempt
// =============================================================================

/// One connection attempt, detached from the session so a dropped session
/// is never kept alive by it.
struct ConnectAttempt {
    session: String,
    server_url: String,
    options: SessionOptions,
    transport: Arc<dyn SessionTransport>,
    security: Arc<SecurityConfig>,
    settings: Arc<ClientSettings>,
    endpoints: Arc<RwLock<Vec<EndpointDescription>>>,
    sink: StatusSink,
}

impl ConnectAttempt {
    async fn run(self) -> OpcUaResult<Option<EndpointDescription>> {
        let identity = match &self.options.identity_file {
            Some(path) => load_identity_file(path).await?,
            None => IdentityToken::Anonymous,
        };

        let endpoint = if self.options.security.is_unsecured_default() {
            tracing::debug!(session = %self.session, "No security configured, skipping discovery");
            None
        } else {
            Some(self.select_endpoint().await?)
        };

        if let Some(ep) = &endpoint {
            if !ep.security_mode.is_none() && !ep.server_certificate.is_empty() {
                self.security
                    .verify_server_certificate(&ep.server_certificate)
                    .await?;
            }
            if !ep.user_token_types.is_empty() && !ep.user_token_types.contains(&identity.kind()) {
                return Err(OpcUaError::security(SecurityError::authentication_failed(
                    format!("endpoint {} does not accept {} tokens", ep.endpoint_url, identity.kind()),
                )));
            }
        }

        let request = ConnectRequest {
            session_name: self.session,
            server_url: self.server_url,
            endpoint: endpoint.clone(),
            identity,
            security: self.security,
            settings: Arc::clone(&self.settings),
        };
        let target = request.target_url().to_string();
        let timeout = self.settings.connect_timeout;

        // a lost connection still holds transport resources
        if let Err(e) = self.transport.disconnect().await {
            e.log(&format!("session {} release before connect", request.session_name));
        }

        match tokio::time::timeout(timeout, self.transport.connect(request, self.sink)).await {
            Ok(result) => result.map(|()| endpoint),
            Err(_) => Err(OpcUaError::connection(ConnectionError::timed_out(target, timeout))),
        }
    }

    async fn select_endpoint(&self) -> OpcUaResult<EndpointDescription> {
        if self.options.debug_level > 0 {
            tracing::info!(session = %self.session, url = %self.server_url, "Reading endpoints");
        }

        let discovered = self.transport.get_endpoints(&self.server_url).await?;
        *self.endpoints.write() = discovered.clone();

        select_or_fail(&discovered, &self.options.security, &self.server_url).map_err(|e| {
            tracing::error!(
                session = %self.session,
                request = %self.options.security,
                "Found no endpoint that matches the security requirements"
            );
            e
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
