// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transport abstraction.
//!
//! The session layer never speaks the OPC UA protocol itself. Discovery,
//! secure channel and session activation are delegated to a
//! [`SessionTransport`], one instance per session, created by a
//! [`TransportFactory`].

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::certificate::SecurityConfig;
use crate::error::OpcUaResult;
use crate::identity::IdentityToken;
use crate::settings::ClientSettings;
use crate::types::{EndpointDescription, ServerStatus};

// =============================================================================
// StatusSink
// =============================================================================

/// Receiver for server status reports after a connection is up.
///
/// Reporting never blocks and may be done from any thread. Reports made
/// after the session moved on to a newer connection are discarded.
#[derive(Clone)]
pub struct StatusSink {
    report: Arc<dyn Fn(ServerStatus) + Send + Sync>,
}

impl StatusSink {
    /// Creates a sink from a callback.
    pub fn new(report: impl Fn(ServerStatus) + Send + Sync + 'static) -> Self {
        Self {
            report: Arc::new(report),
        }
    }

    /// Creates a sink that drops every report.
    pub fn discard() -> Self {
        Self::new(|_| {})
    }

    /// Reports a server status change.
    pub fn report(&self, status: ServerStatus) {
        (self.report)(status);
    }
}

impl fmt::Debug for StatusSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StatusSink")
    }
}

// =============================================================================
// ConnectRequest
// =============================================================================

/// Everything a transport needs to open one session.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// Session name, also used as the OPC UA session name.
    pub session_name: String,
    /// Server URL the session was created with.
    pub server_url: String,
    /// Selected endpoint, `None` to connect unsecured without discovery.
    pub endpoint: Option<EndpointDescription>,
    /// User identity to activate the session with.
    pub identity: IdentityToken,
    /// Client security configuration.
    pub security: Arc<SecurityConfig>,
    /// Client-wide settings.
    pub settings: Arc<ClientSettings>,
}

impl ConnectRequest {
    /// Returns the URL to connect to: the endpoint's URL when one was
    /// selected, otherwise the server URL.
    pub fn target_url(&self) -> &str {
        self.endpoint
            .as_ref()
            .map(|ep| ep.endpoint_url.as_str())
            .unwrap_or(&self.server_url)
    }

    /// Returns the client certificate and key, if configured.
    pub fn client_certificate(&self) -> Option<(PathBuf, PathBuf)> {
        let cert = self.security.client_certificate()?;
        let key = self.security.client_private_key()?;
        Some((cert.to_path_buf(), key.to_path_buf()))
    }
}

// =============================================================================
// SessionTransport Trait
// =============================================================================

/// Client protocol stack used by one session.
///
/// Implementations must be `Send + Sync`; calls may come from the session's
/// attempt task and from `disconnect` on different tasks.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Reads the endpoint list from a discovery URL.
    async fn get_endpoints(&self, discovery_url: &str) -> OpcUaResult<Vec<EndpointDescription>>;

    /// Opens the secure channel and activates a session.
    ///
    /// Resolves once the session is up. Later status changes are reported
    /// through `status`.
    async fn connect(&self, request: ConnectRequest, status: StatusSink) -> OpcUaResult<()>;

    /// Closes the session, deleting its subscriptions.
    ///
    /// Must succeed when nothing is connected.
    async fn disconnect(&self) -> OpcUaResult<()>;

    /// Returns a display name for logging.
    fn display_name(&self) -> String;
}

/// Creates one transport per session.
pub trait TransportFactory: Send + Sync {
    /// Creates the transport for a new session.
    fn create(&self, session_name: &str, server_url: &str) -> Arc<dyn SessionTransport>;
}

impl<F> TransportFactory for F
where
    F: Fn(&str, &str) -> Arc<dyn SessionTransport> + Send + Sync,
{
    fn create(&self, session_name: &str, server_url: &str) -> Arc<dyn SessionTransport> {
        self(session_name, server_url)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SecurityMode, SecurityPolicy};
    use parking_lot::Mutex;

    fn request(endpoint: Option<EndpointDescription>) -> ConnectRequest {
        ConnectRequest {
            session_name: "s1".into(),
            server_url: "opc.tcp://plc:4840".into(),
            endpoint,
            identity: IdentityToken::Anonymous,
            security: SecurityConfig::unsecured("test"),
            settings: Arc::new(ClientSettings::default()),
        }
    }

    #[test]
    fn test_status_sink_forwards() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let sink = StatusSink::new(move |s| sink_seen.lock().push(s));

        let cloned = sink.clone();
        sink.report(ServerStatus::Connected);
        cloned.report(ServerStatus::ServerShutdown);

        assert_eq!(
            *seen.lock(),
            vec![ServerStatus::Connected, ServerStatus::ServerShutdown]
        );
        StatusSink::discard().report(ServerStatus::Connected);
    }

    #[test]
    fn test_target_url() {
        assert_eq!(request(None).target_url(), "opc.tcp://plc:4840");

        let endpoint = EndpointDescription::new(
            "opc.tcp://plc.local:4841",
            SecurityMode::Sign,
            SecurityPolicy::Basic256Sha256,
            3,
        );
        assert_eq!(request(Some(endpoint)).target_url(), "opc.tcp://plc.local:4841");
    }

    #[test]
    fn test_no_client_certificate_by_default() {
        assert!(request(None).client_certificate().is_none());
    }
}
